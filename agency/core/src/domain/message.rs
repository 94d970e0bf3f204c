// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # ACL Message Model
//!
//! The structured message exchanged between agents. Field names on the wire are
//! fixed for interoperability with other cloneMAP agencies (Go and Python
//! implementations), so every field carries an explicit `serde` rename.
//!
//! Performatives and protocols travel as plain integers. [`FipaPerformative`]
//! and [`FipaProtocol`] give them names without rejecting unknown codes: an
//! agency must forward a message with an unknown protocol untouched.

use crate::domain::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol id carried by the out-of-band custom configuration update.
pub const CUSTOM_UPDATE_PROTOCOL: i32 = -1;

/// Sender id carried by the out-of-band custom configuration update.
pub const CUSTOM_UPDATE_SENDER: AgentId = AgentId(-1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclMessage {
    /// Sending time
    #[serde(rename = "ts", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Communicative act (see [`FipaPerformative`])
    #[serde(rename = "perf", default)]
    pub performative: i32,

    /// Overwritten by the sending endpoint; never trusted from the caller
    #[serde(default)]
    pub sender: AgentId,

    #[serde(rename = "agencys", default)]
    pub sender_agency: String,

    pub receiver: AgentId,

    #[serde(rename = "agencyr", default)]
    pub receiver_agency: String,

    #[serde(rename = "repto", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<AgentId>,

    pub content: String,

    #[serde(rename = "lang", default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(rename = "enc", default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    #[serde(rename = "ont", default, skip_serializing_if = "Option::is_none")]
    pub ontology: Option<String>,

    /// Interaction protocol; 0 means none
    #[serde(rename = "prot", default)]
    pub protocol: i32,

    #[serde(rename = "convid", default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,

    #[serde(rename = "repwith", default, skip_serializing_if = "Option::is_none")]
    pub reply_with: Option<String>,

    #[serde(rename = "inrepto", default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,

    /// Latest time by which the sender would like a reply
    #[serde(rename = "repby", default, skip_serializing_if = "Option::is_none")]
    pub reply_by: Option<String>,
}

impl AclMessage {
    /// Create a message with neither protocol nor performative set.
    pub fn new(receiver: AgentId, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            performative: FipaPerformative::None as i32,
            sender: AgentId::default(),
            sender_agency: String::new(),
            receiver,
            receiver_agency: String::new(),
            reply_to: None,
            content: content.into(),
            language: None,
            encoding: None,
            ontology: None,
            protocol: FipaProtocol::None as i32,
            conversation_id: None,
            reply_with: None,
            in_reply_to: None,
            reply_by: None,
        }
    }

    /// Out-of-band message carrying a new custom configuration for `receiver`.
    pub fn custom_update(receiver: AgentId, custom: impl Into<String>) -> Self {
        let mut msg = Self::new(receiver, custom);
        msg.sender = CUSTOM_UPDATE_SENDER;
        msg.protocol = CUSTOM_UPDATE_PROTOCOL;
        msg
    }

    pub fn with_performative(mut self, performative: impl Into<i32>) -> Self {
        self.performative = performative.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<i32>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_conversation(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_reply_with(mut self, token: impl Into<String>) -> Self {
        self.reply_with = Some(token.into());
        self
    }

    pub fn with_in_reply_to(mut self, token: impl Into<String>) -> Self {
        self.in_reply_to = Some(token.into());
        self
    }

    pub fn with_reply_to(mut self, agent: AgentId) -> Self {
        self.reply_to = Some(agent);
        self
    }

    /// Build a reply addressed to the sender (or its `repto` delegate), keeping
    /// the protocol and conversation and answering the `repwith` token.
    pub fn reply(&self, performative: impl Into<i32>, content: impl Into<String>) -> Self {
        let mut reply = Self::new(self.reply_to.unwrap_or(self.sender), content)
            .with_performative(performative)
            .with_protocol(self.protocol);
        reply.conversation_id = self.conversation_id;
        reply.in_reply_to = self.reply_with.clone();
        reply
    }

    /// True for the distinguished configuration update marker.
    pub fn is_custom_update(&self) -> bool {
        self.protocol == CUSTOM_UPDATE_PROTOCOL && self.sender == CUSTOM_UPDATE_SENDER
    }
}

impl fmt::Display for AclMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sender: {};Receiver: {};Timestamp: {};Protocol: ",
            self.sender,
            self.receiver,
            self.timestamp.to_rfc3339()
        )?;
        match FipaProtocol::try_from(self.protocol) {
            Ok(p) => write!(f, "{:?}", p)?,
            Err(code) => write!(f, "Unknown({})", code)?,
        }
        f.write_str(";Performative: ")?;
        match FipaPerformative::try_from(self.performative) {
            Ok(p) => write!(f, "{:?}", p)?,
            Err(code) => write!(f, "Unknown({})", code)?,
        }
        write!(f, ";Content: {}", self.content)
    }
}

/// FIPA communicative acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FipaPerformative {
    None = 0,
    AcceptProposal = 1,
    Agree = 2,
    Cancel = 3,
    CallForProposal = 4,
    Confirm = 5,
    Disconfirm = 6,
    Failure = 7,
    Inform = 8,
    InformIf = 9,
    InformRef = 10,
    NotUnderstood = 11,
    Propagate = 12,
    Propose = 13,
    Proxy = 14,
    QueryIf = 15,
    QueryRef = 16,
    Refuse = 17,
    RejectProposal = 18,
    Request = 19,
    RequestWhen = 20,
    RequestWhenever = 21,
    Subscribe = 22,
}

impl From<FipaPerformative> for i32 {
    fn from(value: FipaPerformative) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for FipaPerformative {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use FipaPerformative::*;
        const ALL: [FipaPerformative; 23] = [
            None, AcceptProposal, Agree, Cancel, CallForProposal, Confirm, Disconfirm, Failure,
            Inform, InformIf, InformRef, NotUnderstood, Propagate, Propose, Proxy, QueryIf,
            QueryRef, Refuse, RejectProposal, Request, RequestWhen, RequestWhenever, Subscribe,
        ];
        usize::try_from(value)
            .ok()
            .and_then(|idx| ALL.get(idx).copied())
            .ok_or(value)
    }
}

/// FIPA interaction protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FipaProtocol {
    None = 0,
    Request = 1,
    Query = 2,
    RequestWhen = 3,
    ContractNet = 4,
    IteratedContractNet = 5,
    EnglishAuction = 6,
    DutchAuction = 7,
    Brokering = 8,
    Recruiting = 9,
    Subscribe = 10,
    Propose = 11,
}

impl From<FipaProtocol> for i32 {
    fn from(value: FipaProtocol) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for FipaProtocol {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use FipaProtocol::*;
        const ALL: [FipaProtocol; 12] = [
            None, Request, Query, RequestWhen, ContractNet, IteratedContractNet, EnglishAuction,
            DutchAuction, Brokering, Recruiting, Subscribe, Propose,
        ];
        usize::try_from(value)
            .ok()
            .and_then(|idx| ALL.get(idx).copied())
            .ok_or(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let msg = AclMessage::new(AgentId(1), "ping")
            .with_protocol(7)
            .with_performative(FipaPerformative::Inform)
            .with_conversation(42);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["receiver"], json!(1));
        assert_eq!(value["prot"], json!(7));
        assert_eq!(value["perf"], json!(8));
        assert_eq!(value["convid"], json!(42));
        assert_eq!(value["content"], json!("ping"));
        assert!(value.get("repwith").is_none());
        assert!(value["ts"].is_string());
    }

    #[test]
    fn test_decode_minimal_message_uses_defaults() {
        let msg: AclMessage =
            serde_json::from_str(r#"{"receiver": 3, "content": "hello"}"#).unwrap();
        assert_eq!(msg.receiver, AgentId(3));
        assert_eq!(msg.protocol, 0);
        assert_eq!(msg.performative, 0);
        assert_eq!(msg.sender_agency, "");
        assert!(msg.conversation_id.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_receiver() {
        let res: Result<AclMessage, _> = serde_json::from_str(r#"{"content": "hello"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_decode_python_timestamp() {
        let msg: AclMessage = serde_json::from_str(
            r#"{"ts": "2021-03-02T20:49:04.123456Z", "receiver": 1, "content": "x", "prot": 4}"#,
        )
        .unwrap();
        assert_eq!(FipaProtocol::try_from(msg.protocol), Ok(FipaProtocol::ContractNet));
    }

    #[test]
    fn test_custom_update_marker() {
        let msg = AclMessage::custom_update(AgentId(5), "{\"k\":1}");
        assert!(msg.is_custom_update());

        let mut plain = AclMessage::new(AgentId(5), "x").with_protocol(CUSTOM_UPDATE_PROTOCOL);
        assert!(!plain.is_custom_update());
        plain.sender = CUSTOM_UPDATE_SENDER;
        assert!(plain.is_custom_update());
    }

    #[test]
    fn test_reply_keeps_conversation() {
        let mut request = AclMessage::new(AgentId(2), "q")
            .with_protocol(FipaProtocol::Request)
            .with_conversation(9)
            .with_reply_with("r-1");
        request.sender = AgentId(1);

        let reply = request.reply(FipaPerformative::Agree, "ok");
        assert_eq!(reply.receiver, AgentId(1));
        assert_eq!(reply.protocol, FipaProtocol::Request as i32);
        assert_eq!(reply.conversation_id, Some(9));
        assert_eq!(reply.in_reply_to.as_deref(), Some("r-1"));

        let delegated = request.clone().with_reply_to(AgentId(7));
        assert_eq!(delegated.reply(FipaPerformative::Agree, "ok").receiver, AgentId(7));
    }

    #[test]
    fn test_display_names_known_and_unknown_codes() {
        let mut msg = AclMessage::new(AgentId(1), "c")
            .with_protocol(FipaProtocol::ContractNet)
            .with_performative(FipaPerformative::Propose);
        let text = msg.to_string();
        assert!(text.contains("Protocol: ContractNet"));
        assert!(text.contains("Performative: Propose"));
        assert!(text.ends_with(";Content: c"));

        msg.protocol = 99;
        assert!(msg.to_string().contains("Protocol: Unknown(99)"));
    }

    #[test]
    fn test_enum_conversion_bounds() {
        assert_eq!(FipaPerformative::try_from(22), Ok(FipaPerformative::Subscribe));
        assert_eq!(FipaPerformative::try_from(23), Err(23));
        assert_eq!(FipaProtocol::try_from(-1), Err(-1));
        assert_eq!(i32::from(FipaProtocol::Propose), 11);
    }
}
