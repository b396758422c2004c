//! Message selection by ECU, application and context id.
//!
//! A [`FilterSet`] holds up to [`FilterSet::MAX_RULES`] rules. A message
//! passes the set if any rule matches it; within a rule every non-wildcard
//! field must equal the message's id.
//!
//! Rule files list one rule per line:
//!
//! ```text
//! # ECU APP  CTX
//! ECU1 LOG  TEST
//! -    APP1        # any ECU, any context
//! ```
//!
//! ```
//! use dlt_core::{FilterSet, LoadMode, Result};
//!
//! fn main() -> Result<()> {
//!     let filters = FilterSet::load("ECU1 LOG TEST\n- APP1\n", LoadMode::Strict)?;
//!     assert_eq!(filters.len(), 2);
//!     Ok(())
//! }
//! ```

use alloc::format;
use alloc::vec::Vec;

use log::{debug, warn};

use crate::message::{Id, Message};
use crate::{Error, Result};

/// How [`FilterSet::load`] treats malformed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadMode {
    /// Fail on the first malformed line.
    #[default]
    Strict,
    /// Log and skip malformed lines.
    Lenient,
}

/// One match tuple. `None` fields match any id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterRule {
    pub ecu: Option<Id>,
    pub app: Option<Id>,
    pub context: Option<Id>,
}

impl FilterRule {
    pub fn new(ecu: Option<Id>, app: Option<Id>, context: Option<Id>) -> Self {
        Self { ecu, app, context }
    }

    /// Parse `ECU APP CTX`; `-` or a missing trailing field is a wildcard.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() > 3 {
            return Err(Error::InvalidOption(format!(
                "filter rule {line:?} has more than three fields"
            )));
        }
        let field = |index: usize| -> Result<Option<Id>> {
            match fields.get(index) {
                None | Some(&"-") => Ok(None),
                Some(text) => text.parse().map(Some),
            }
        };
        Ok(Self {
            ecu: field(0)?,
            app: field(1)?,
            context: field(2)?,
        })
    }

    pub fn matches(&self, message: &Message<'_>) -> bool {
        fn field_matches(rule: Option<Id>, actual: Option<Id>) -> bool {
            match rule {
                None => true,
                Some(id) => actual == Some(id),
            }
        }
        field_matches(self.ecu, message.ecu())
            && field_matches(self.app, message.app())
            && field_matches(self.context, message.context())
    }
}

/// Ordered, bounded set of filter rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    rules: Vec<FilterRule>,
}

impl FilterSet {
    /// Maximum number of rules in a set.
    pub const MAX_RULES: usize = 30;

    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rules from the text of a rule file.
    ///
    /// Blank lines and lines starting with `#` are ignored, as is anything
    /// after a `#` on a rule line.
    pub fn load(text: &str, mode: LoadMode) -> Result<Self> {
        let mut set = Self::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let result = FilterRule::parse(line).and_then(|rule| set.add(rule));
            match (result, mode) {
                (Ok(()), _) => {}
                (Err(err), LoadMode::Strict) => return Err(err),
                (Err(err), LoadMode::Lenient) => {
                    warn!("skipping filter line {}: {err}", number + 1);
                }
            }
        }
        debug!("loaded {} filter rules", set.len());
        Ok(set)
    }

    /// Read and parse a rule file.
    #[cfg(feature = "std")]
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P, mode: LoadMode) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::load(&text, mode)
    }

    /// Append a rule. Adding a rule that is already present is a no-op.
    ///
    /// Fails with [`Error::InvalidOption`] when the set is full.
    pub fn add(&mut self, rule: FilterRule) -> Result<()> {
        if self.find(&rule).is_some() {
            return Ok(());
        }
        if self.rules.len() >= Self::MAX_RULES {
            return Err(Error::InvalidOption(format!(
                "filter set is limited to {} rules",
                Self::MAX_RULES
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Remove a rule, keeping the order of the others.
    pub fn delete(&mut self, rule: &FilterRule) -> Result<()> {
        let index = self.find(rule).ok_or(Error::NotPresent("filter rule"))?;
        self.rules.remove(index);
        Ok(())
    }

    /// Position of a rule in the set.
    pub fn find(&self, rule: &FilterRule) -> Option<usize> {
        self.rules.iter().position(|r| r == rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Returns true if any rule matches. An empty set matches nothing.
    pub fn matches(&self, message: &Message<'_>) -> bool {
        self.rules.iter().any(|rule| rule.matches(message))
    }
}
