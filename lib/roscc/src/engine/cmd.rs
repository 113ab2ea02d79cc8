// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! RouterOS command text.
//!
//! A [`Command`] is one line of a RouterOS script below a menu path
//! ([`Section`]), e.g. `add address=10.0.0.1/24 interface=bridge1`
//! below `/ip address`.

use core::fmt;
use core::fmt::Display;
use serde::Serialize;
use std::borrow::Cow;

/// A RouterOS menu path, e.g. `/ip firewall mangle`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Section(Cow<'static, str>);

impl Section {
    pub const INTERFACE_BRIDGE: Self = Self::from_static("/interface bridge");
    pub const BRIDGE_PORT: Self = Self::from_static("/interface bridge port");
    pub const INTERFACE_LIST: Self = Self::from_static("/interface list");
    pub const INTERFACE_LIST_MEMBER: Self =
        Self::from_static("/interface list member");
    pub const VLAN: Self = Self::from_static("/interface vlan");
    pub const ADDRESS: Self = Self::from_static("/ip address");
    pub const POOL: Self = Self::from_static("/ip pool");
    pub const DHCP_SERVER: Self = Self::from_static("/ip dhcp-server");
    pub const DHCP_NETWORK: Self =
        Self::from_static("/ip dhcp-server network");
    pub const DNS_FORWARDERS: Self = Self::from_static("/ip dns forwarders");
    pub const ADDRESS_LIST: Self =
        Self::from_static("/ip firewall address-list");
    pub const NAT: Self = Self::from_static("/ip firewall nat");
    pub const MANGLE: Self = Self::from_static("/ip firewall mangle");
    pub const ROUTE: Self = Self::from_static("/ip route");
    pub const ROUTING_TABLE: Self = Self::from_static("/routing table");

    pub const fn from_static(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(Cow::Owned(path.into()))
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One command below a [`Section`].
///
/// Flags (bare words such as `fib`) render right after the verb,
/// arguments in insertion order after them, and the comment, if any,
/// always renders last.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    verb: String,
    flags: Vec<String>,
    args: Vec<(String, String)>,
    comment: Option<String>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            flags: vec![],
            args: vec![],
            comment: None,
        }
    }

    pub fn add() -> Self {
        Self::new("add")
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }

    pub fn arg(mut self, key: &str, val: impl Display) -> Self {
        self.args.push((key.to_string(), val.to_string()));
        self
    }

    /// Add `key=val` only when there is a value.
    pub fn arg_opt<T: Display>(self, key: &str, val: Option<T>) -> Self {
        match val {
            Some(val) => self.arg(key, val),
            None => self,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The value of the first `key` argument. A flag reads as an empty
    /// value.
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == "comment" {
            return self.comment.as_deref();
        }
        if self.flags.iter().any(|f| f == key) {
            return Some("");
        }
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Read a command back from its text.
    ///
    /// This is tolerant: a leading bare word is the verb, any other
    /// bare word is a flag, and an unterminated quote runs to the end of
    /// the line.
    pub fn parse(line: &str) -> Self {
        let mut cmd = Command::new("");
        for (i, token) in tokenize(line).into_iter().enumerate() {
            match token.split_once('=') {
                Some((key, val)) => {
                    let val = unquote(val);
                    if key == "comment" {
                        cmd.comment = Some(val);
                    } else {
                        cmd.args.push((key.to_string(), val));
                    }
                }
                None if i == 0 => cmd.verb = token,
                None => cmd.flags.push(token),
            }
        }
        cmd
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        for flag in &self.flags {
            write!(f, " {flag}")?;
        }
        for (key, val) in &self.args {
            write!(f, " {key}={}", quote(val))?;
        }
        if let Some(comment) = &self.comment {
            write!(f, " comment={}", quote(comment))?;
        }
        Ok(())
    }
}

fn needs_quotes(val: &str) -> bool {
    val.is_empty()
        || val.chars().any(|c| {
            c.is_whitespace() || matches!(c, '"' | '\\' | '$' | ';' | '=')
        })
}

/// Quote a value the way the RouterOS console expects it.
pub fn quote(val: &str) -> Cow<'_, str> {
    if !needs_quotes(val) {
        return Cow::Borrowed(val);
    }

    let mut out = String::with_capacity(val.len() + 2);
    out.push('"');
    for c in val.chars() {
        if matches!(c, '"' | '\\' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Cow::Owned(out)
}

fn unquote(val: &str) -> String {
    let Some(inner) = val.strip_prefix('"') else {
        return val.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

// Split on whitespace that is outside double quotes, keeping the quotes
// (and escapes) in the tokens for `unquote` to deal with.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                cur.push(c);
                cur.extend(chars.next());
            }
            '"' => {
                in_quotes = !in_quotes;
                cur.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    tokens.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }

    if !cur.is_empty() {
        tokens.push(cur);
    }
    tokens
}
