//! # Decision Variables

use std::fmt;

use super::{Domain, Error};

/// A named decision variable over a finite [`Domain`]. Identity within a model is by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    name: String,
    domain: Domain,
}

impl Variable {
    /// Creates a new variable
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] if `name` does not match `[A-Za-z][A-Za-z0-9_]*`.
    pub fn new<S: Into<String>>(name: S, domain: Domain) -> Result<Self, Error> {
        let name = name.into();
        check_identifier(&name)?;
        Ok(Variable { name, domain })
    }

    /// The variable name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variable domain
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.name, self.domain)
    }
}

/// Checks the identifier rule shared by variables and constraints
pub(crate) fn check_identifier(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}
