use std::fmt;
use std::net::IpAddr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Protocol;

/// Deterministic answer to one catalog question, computed from the packets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ReferenceAnswer {
    Count(u64),
    Quantity(f64),
    Protocol(Protocol),
    /// The most active address. More than one entry means a tie, and any of
    /// them is acceptable.
    Addresses(Vec<IpAddr>),
    /// The computation is undefined for this capture; the message says why.
    Undefined(String),
}

impl ReferenceAnswer {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReferenceAnswer::Count(count) => Some(*count as f64),
            ReferenceAnswer::Quantity(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceAnswer::Count(count) => write!(f, "{count}"),
            ReferenceAnswer::Quantity(value) => write!(f, "{value}"),
            ReferenceAnswer::Protocol(protocol) => write!(f, "{protocol}"),
            ReferenceAnswer::Addresses(addresses) => match addresses.as_slice() {
                [single] => write!(f, "{single}"),
                many => {
                    let joined = many
                        .iter()
                        .map(|address| address.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, "any of {{{joined}}}")
                }
            },
            ReferenceAnswer::Undefined(message) => write!(f, "{message}"),
        }
    }
}

/// Reference answers for one capture, keyed by question text in catalog order.
pub type ReferenceAnswers = IndexMap<String, ReferenceAnswer>;

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tie_lists_every_address() {
        let fixture = ReferenceAnswer::Addresses(vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        ]);
        let actual = fixture.to_string();
        let expected = "any of {10.0.0.1, 10.0.0.2}";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_single_address_display() {
        let fixture = ReferenceAnswer::Addresses(vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]);
        assert_eq!(fixture.to_string(), "8.8.8.8");
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(ReferenceAnswer::Count(5).as_number(), Some(5.0));
        assert_eq!(ReferenceAnswer::Quantity(1.25).as_number(), Some(1.25));
        assert_eq!(ReferenceAnswer::Protocol(Protocol::Tcp).as_number(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let fixture = ReferenceAnswer::Protocol(Protocol::Udp);
        let actual = serde_json::to_value(&fixture).unwrap();
        let expected = serde_json::json!({"type": "protocol", "value": "UDP"});
        assert_eq!(actual, expected);
    }
}
