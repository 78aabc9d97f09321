use crate::utils::error::ModelError;
use crate::make_error;
use eyre::Report;
use indexmap::IndexSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::fmt::Display;
use strum_macros::{Display, EnumString};

pub const GAP_CHAR: char = '-';

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SmartDefault, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AlphabetName {
  #[default]
  Nuc,
  Aa,
}

/// Ordered, immutable set of discrete states.
///
/// Defines the dimension of every matrix of a model and the mapping between symbols and matrix indices. Optionally
/// one of the symbols is designated as the gap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
  symbols: IndexSet<char>,
  gap: Option<char>,
}

impl Default for Alphabet {
  fn default() -> Self {
    Self::new(AlphabetName::Nuc)
  }
}

impl Alphabet {
  /// Create one of the pre-defined alphabets
  pub fn new(name: AlphabetName) -> Self {
    let symbols = match name {
      AlphabetName::Nuc => "ACGT",
      AlphabetName::Aa => "ACDEFGHIKLMNPQRSTVWY",
    };
    Self {
      symbols: symbols.chars().collect(),
      gap: None,
    }
  }

  /// Create custom alphabet from a list of distinct symbols
  pub fn from_symbols(symbols: impl IntoIterator<Item = char>) -> Result<Self, Report> {
    let symbols = symbols.into_iter().collect_vec();
    if symbols.is_empty() {
      return make_error!("When creating alphabet: set of symbols is empty. This is not allowed.");
    }

    if let Some(symbol) = symbols.iter().duplicates().next() {
      return Err(ModelError::DuplicateSymbol { symbol: *symbol }.into_report());
    }

    Ok(Self {
      symbols: symbols.into_iter().collect(),
      gap: None,
    })
  }

  /// Create a new alphabet, extended with a gap symbol appended after all existing symbols
  pub fn with_gap(&self, gap: char) -> Result<Self, Report> {
    if self.symbols.contains(&gap) {
      return Err(ModelError::DuplicateSymbol { symbol: gap }.into_report());
    }
    let mut symbols = self.symbols.clone();
    symbols.insert(gap);
    Ok(Self {
      symbols,
      gap: Some(gap),
    })
  }

  /// Get index of a symbol (indexed in the same order as given by `.symbols()`)
  pub fn index(&self, c: char) -> Result<usize, Report> {
    self.index_maybe(c).ok_or_else(|| {
      ModelError::UnknownSymbol {
        symbol: c,
        known: self.symbols.iter().join(", "),
      }
      .into_report()
    })
  }

  #[inline]
  pub fn index_maybe(&self, c: char) -> Option<usize> {
    self.symbols.get_index_of(&c)
  }

  /// Get symbol by index
  pub fn symbol(&self, index: usize) -> Option<char> {
    self.symbols.get_index(index).copied()
  }

  pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
    self.symbols.iter().copied()
  }

  pub fn contains(&self, c: char) -> bool {
    self.symbols.contains(&c)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  /// Get 'gap' symbol, if the alphabet has one
  pub fn gap(&self) -> Option<char> {
    self.gap
  }

  pub fn gap_index(&self) -> Option<usize> {
    self.gap.and_then(|gap| self.index_maybe(gap))
  }

  /// Check if symbol is a gap
  pub fn is_gap(&self, c: char) -> bool {
    self.gap == Some(c)
  }
}

impl Display for Alphabet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.symbols.iter().join(""))
  }
}
