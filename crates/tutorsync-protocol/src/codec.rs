//! JSON encoding with a size limit.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a message as JSON.
///
/// # Errors
///
/// Fails if serialization fails or the result exceeds [`MAX_MESSAGE_SIZE`].
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(json)
}

/// Decodes a JSON message.
///
/// Leading and trailing whitespace is ignored.
///
/// # Errors
///
/// Fails on empty or oversized input and on malformed JSON.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::EmptyMessage);
    }
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    #[test]
    fn decode_rejects_empty() {
        let result: ProtocolResult<Request> = decode_message(b"  \n");
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn decode_rejects_oversized() {
        let data = vec![b' '; MAX_MESSAGE_SIZE + 1];
        let result: ProtocolResult<Request> = decode_message(&data);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn decode_rejects_unknown_action() {
        let result: ProtocolResult<Request> = decode_message(br#"{"action":"dropTables"}"#);
        assert!(matches!(result, Err(ProtocolError::Serialization(_))));
    }

    #[test]
    fn encode_then_decode_delete() {
        let request = Request::delete_session("abc");
        let bytes = encode_message(&request).unwrap();
        let decoded: Request = decode_message(&bytes).unwrap();
        assert_eq!(decoded, request);
    }
}
