//! The per-reference-id record the engine persists.

use offchain_types::{Command, CommandRequest, Payment, Role};

/// The last accepted command of one payment exchange.
///
/// `cmd_json` holds the canonical JSON of the command; an inbound request
/// whose command serializes to the same bytes is an idempotent replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub reference_id: String,
    /// cid of the request that last touched this record.
    pub cid: String,
    /// Which side of the payment the local VASP is on.
    pub role: Role,
    pub cmd_json: String,
}

impl Record {
    pub fn new(request: &CommandRequest, role: Role) -> serde_json::Result<Self> {
        Ok(Record {
            reference_id: request.reference_id().to_string(),
            cid: request.cid.clone(),
            role,
            cmd_json: request.command.canonical_json()?,
        })
    }

    pub fn command(&self) -> serde_json::Result<Command> {
        serde_json::from_str(&self.cmd_json)
    }

    pub fn payment(&self) -> serde_json::Result<Payment> {
        self.command().map(|command| command.payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offchain_types::KycData;

    #[test]
    fn record_round_trips_its_command() {
        let request = CommandRequest::initial_payment(
            "sender-account",
            KycData::individual().with_given_name("foo"),
            "receiver-account",
            1_000,
            "XUS",
        );
        let record = Record::new(&request, Role::Sender).unwrap();

        assert_eq!(record.reference_id, request.reference_id());
        assert_eq!(record.cid, request.cid);
        assert_eq!(record.command().unwrap(), request.command);
        assert_eq!(
            record.payment().unwrap().reference_id,
            request.reference_id()
        );
    }
}
