//! Template rendering
//!
//! Templates are plain strings with `{TOKEN}` placeholders. Substitution is a
//! single left-to-right pass, so a replacement value is never scanned again:
//! a server called `{ID}` renders as `{ID}`, and the result does not depend on
//! the order tokens are listed in. Unknown `{...}` sequences are kept verbatim.

use std::borrow::Cow;

use crate::types::{ServerRecord, NO_ADDRESS, NO_IPV4, NO_IPV6};

pub const FLAG_FR: &str = "\u{1F1EB}\u{1F1F7}";
pub const FLAG_NL: &str = "\u{1F1F3}\u{1F1F1}";
pub const FLAG_GENERIC: &str = "\u{1F3F3}";
pub const ALIVE_OK: &str = "\u{2705}";
pub const ALIVE_ERR: &str = "\u{274C}";

/// Placeholder tokens understood by the renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Id,
    Name,
    Ipv4,
    Ipv6,
    /// IPv4 if present, else IPv6
    IpvX,
    State,
    Region,
    Ping,
    /// Region icon, display templates only
    Flag,
    /// Reachability icon, display templates only
    Alive,
}

impl Token {
    pub const ALL: [Token; 10] = [
        Token::Id,
        Token::Name,
        Token::Ipv4,
        Token::Ipv6,
        Token::IpvX,
        Token::State,
        Token::Region,
        Token::Ping,
        Token::Flag,
        Token::Alive,
    ];

    /// Token text including braces
    pub fn placeholder(self) -> &'static str {
        match self {
            Token::Id => "{ID}",
            Token::Name => "{NAME}",
            Token::Ipv4 => "{IPv4}",
            Token::Ipv6 => "{IPv6}",
            Token::IpvX => "{IPvX}",
            Token::State => "{STATE}",
            Token::Region => "{REGION}",
            Token::Ping => "{PING}",
            Token::Flag => "{FLAG}",
            Token::Alive => "{ALIVE}",
        }
    }

    fn from_name(name: &str) -> Option<Token> {
        Token::ALL
            .into_iter()
            .find(|token| &token.placeholder()[1..token.placeholder().len() - 1] == name)
    }
}

/// Icon for a region label: Paris and Amsterdam get their flags, anything else the generic flag
pub fn region_icon(region: &str) -> &'static str {
    if region == "par1" || region.starts_with("fr-par") {
        FLAG_FR
    } else if region == "ams1" || region.starts_with("nl-ams") {
        FLAG_NL
    } else {
        FLAG_GENERIC
    }
}

pub fn alive_icon(reachable: bool) -> &'static str {
    if reachable {
        ALIVE_OK
    } else {
        ALIVE_ERR
    }
}

/// Value of `token` for `record`; `None` for display-only tokens when `display` is off
pub fn token_value(token: Token, record: &ServerRecord, display: bool) -> Option<Cow<'_, str>> {
    let info = &record.info;
    let value = match token {
        Token::Id => Cow::Borrowed(info.id.as_str()),
        Token::Name => Cow::Borrowed(info.name.as_str()),
        Token::Ipv4 => Cow::Borrowed(info.ipv4.as_deref().unwrap_or(NO_IPV4)),
        Token::Ipv6 => Cow::Borrowed(info.ipv6.as_deref().unwrap_or(NO_IPV6)),
        Token::IpvX => Cow::Borrowed(
            info.probe_address()
                .map(|(_, address)| address)
                .unwrap_or(NO_ADDRESS),
        ),
        Token::State => Cow::Borrowed(info.state.as_str()),
        Token::Region => Cow::Borrowed(info.region_label()),
        Token::Ping => Cow::Borrowed(record.health.latency.as_str()),
        Token::Flag if display => Cow::Borrowed(region_icon(info.region_label())),
        Token::Alive if display => Cow::Borrowed(alive_icon(record.health.reachable)),
        Token::Flag | Token::Alive => return None,
    };
    Some(value)
}

fn substitute<'a>(template: &str, lookup: impl Fn(Token) -> Option<Cow<'a, str>>) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        match Token::from_name(&tail[1..close]).and_then(&lookup) {
            Some(value) => {
                out.push_str(&value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Fill an export template (clipboard). `{FLAG}` and `{ALIVE}` are left as is.
pub fn fill_mask(template: &str, record: &ServerRecord) -> String {
    substitute(template, |token| token_value(token, record, false))
}

/// Fill a display template (slot titles), including region and reachability icons
pub fn fill_view(template: &str, record: &ServerRecord) -> String {
    substitute(template, |token| token_value(token, record, true))
}
