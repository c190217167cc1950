//! Inline keyboards and the callback payloads they carry.

use std::{fmt, str::FromStr};

use relaydesk_channels::InlineKeyboard;

use crate::{Error, texts};

/// Decoded button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Claim(i64),
    Finish(i64),
    History(i64),
    ToStart,
    TopicWarranty,
    TopicRefund,
    TopicOther,
    ToOperator,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim(id) => write!(f, "claim:{id}"),
            Self::Finish(id) => write!(f, "finish:{id}"),
            Self::History(id) => write!(f, "history:{id}"),
            Self::ToStart => f.write_str("to_start"),
            Self::TopicWarranty => f.write_str("topic_warranty"),
            Self::TopicRefund => f.write_str("topic_refund"),
            Self::TopicOther => f.write_str("topic_other"),
            Self::ToOperator => f.write_str("to_operator"),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || Error::UnknownCallback {
            data: data.to_string(),
        };

        if let Some((verb, id)) = data.split_once(':') {
            let id: i64 = id.trim().parse().map_err(|_| unknown())?;
            return match verb {
                "claim" => Ok(Self::Claim(id)),
                "finish" => Ok(Self::Finish(id)),
                "history" => Ok(Self::History(id)),
                _ => Err(unknown()),
            };
        }

        match data {
            "to_start" => Ok(Self::ToStart),
            "topic_warranty" => Ok(Self::TopicWarranty),
            "topic_refund" => Ok(Self::TopicRefund),
            "topic_other" => Ok(Self::TopicOther),
            "to_operator" => Ok(Self::ToOperator),
            _ => Err(unknown()),
        }
    }
}

pub fn start_menu() -> InlineKeyboard {
    InlineKeyboard::new()
        .button(texts::BUTTON_WARRANTY, CallbackAction::TopicWarranty.to_string())
        .button(texts::BUTTON_REFUND, CallbackAction::TopicRefund.to_string())
        .button(texts::BUTTON_OTHER, CallbackAction::TopicOther.to_string())
}

/// Offered under every topic answer.
pub fn topic() -> InlineKeyboard {
    InlineKeyboard::new()
        .button(texts::BUTTON_YES_OPERATOR, CallbackAction::ToOperator.to_string())
        .button(texts::BUTTON_BACK, CallbackAction::ToStart.to_string())
}

pub fn claim(ticket_id: i64) -> InlineKeyboard {
    InlineKeyboard::new().button(texts::BUTTON_CLAIM, CallbackAction::Claim(ticket_id).to_string())
}

pub fn operator_controls(ticket_id: i64) -> InlineKeyboard {
    InlineKeyboard::new()
        .button(
            texts::BUTTON_HISTORY,
            CallbackAction::History(ticket_id).to_string(),
        )
        .button(
            texts::BUTTON_FINISH,
            CallbackAction::Finish(ticket_id).to_string(),
        )
}
