use kestrel_core::{serialize, Address, Hash, Seal};
use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;
use crate::types::{Preprepare, Subject, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageCode {
    Preprepare,
    Prepare,
    Commit,
    RoundChange,
}

impl MessageCode {
    /// Byte appended to a digest when signing a commit seal
    pub fn as_byte(&self) -> u8 {
        match self {
            MessageCode::Preprepare => 0,
            MessageCode::Prepare => 1,
            MessageCode::Commit => 2,
            MessageCode::RoundChange => 3,
        }
    }

    /// Replay order within a view: proposals first, then commits, then prepares
    pub(crate) fn rank(&self) -> u64 {
        match self {
            MessageCode::Preprepare => 1,
            MessageCode::Commit => 2,
            MessageCode::Prepare => 3,
            MessageCode::RoundChange => 0,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MessageCode::Preprepare => "PRE-PREPARE",
            MessageCode::Prepare => "PREPARE",
            MessageCode::Commit => "COMMIT",
            MessageCode::RoundChange => "ROUND_CHANGE",
        }
    }
}

impl std::fmt::Display for MessageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Data a verifier signs to endorse `digest` for commit
pub fn committed_seal_data(digest: &Hash) -> Vec<u8> {
    let mut data = Vec::with_capacity(33);
    data.extend_from_slice(digest.as_bytes());
    data.push(MessageCode::Commit.as_byte());
    data
}

/// Signed consensus message as exchanged between verifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub code: MessageCode,
    pub payload: Vec<u8>,
    /// Sender
    pub address: Address,
    /// Sender's seal over every other field
    pub signature: Option<Seal>,
    /// Only on COMMIT
    pub committed_seal: Option<Seal>,
}

impl Message {
    pub fn new(code: MessageCode, payload: Vec<u8>) -> Self {
        Message {
            code,
            payload,
            address: Address::ZERO,
            signature: None,
            committed_seal: None,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, ConsensusError> {
        serialize::from_bytes(bytes).map_err(|_| ConsensusError::InvalidMessage)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ConsensusError> {
        Ok(serialize::to_bytes(self)?)
    }

    /// Canonical bytes covered by `signature`
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ConsensusError> {
        let unsigned = (&self.code, &self.payload, &self.address, &self.committed_seal);
        Ok(serialize::to_bytes(&unsigned)?)
    }

    pub fn decode_preprepare(&self) -> Result<Preprepare, ConsensusError> {
        serialize::from_bytes(&self.payload).map_err(|_| ConsensusError::Decode(self.code.name()))
    }

    pub fn decode_subject(&self) -> Result<Subject, ConsensusError> {
        serialize::from_bytes(&self.payload).map_err(|_| ConsensusError::Decode(self.code.name()))
    }

    pub fn view(&self) -> Result<View, ConsensusError> {
        match self.code {
            MessageCode::Preprepare => Ok(self.decode_preprepare()?.view),
            _ => Ok(self.decode_subject()?.view),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::KeyPair;

    fn subject_message(code: MessageCode) -> Message {
        let subject = Subject {
            view: View::new(4, 1),
            digest: Hash([5u8; 32]),
        };
        Message::new(code, serialize::to_bytes(&subject).unwrap())
    }

    #[test]
    fn test_signature_covers_payload() {
        let kp = KeyPair::generate();
        let mut msg = subject_message(MessageCode::Prepare);
        msg.address = kp.address();
        msg.signature = Some(Seal::sign(&kp.secret, &msg.signing_bytes().unwrap()));

        let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
        let seal = decoded.signature.unwrap();
        assert_eq!(seal.recover(&decoded.signing_bytes().unwrap()).unwrap(), kp.address());

        let mut tampered = decoded.clone();
        tampered.code = MessageCode::Commit;
        assert!(seal.recover(&tampered.signing_bytes().unwrap()).is_err());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            Message::decode(&[0xff, 0x01]),
            Err(ConsensusError::InvalidMessage)
        ));
    }

    #[test]
    fn test_view_from_subject() {
        let msg = subject_message(MessageCode::RoundChange);
        assert_eq!(msg.view().unwrap(), View::new(4, 1));

        let bad = Message::new(MessageCode::Preprepare, msg.payload.clone());
        assert!(matches!(bad.view(), Err(ConsensusError::Decode("PRE-PREPARE"))));
    }

    #[test]
    fn test_committed_seal_data_suffix() {
        let data = committed_seal_data(&Hash([1u8; 32]));
        assert_eq!(data.len(), 33);
        assert_eq!(data[32], MessageCode::Commit.as_byte());
    }
}
