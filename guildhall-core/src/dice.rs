//! Dice notation used by dungeon attacks and enemy templates.
//!
//! Supports sums of `XdY` terms and flat modifiers, e.g. `2d6+3` or
//! `1d8+1d4-1`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Most dice a single `XdY` term may roll.
pub const MAX_DICE: u32 = 100;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice in one term: {0}")]
    TooManyDice(u32),
}

/// Die sizes accepted in ability and enemy notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// One `XdY` term, possibly subtracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceTerm {
    pub count: u32,
    pub die_type: DieType,
    pub negative: bool,
}

/// A parsed dice expression.
///
/// Serialized as its notation string so catalogs stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub modifier: i32,
    original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut terms = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut negative = false;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_term(&current, negative, &mut terms, &mut modifier)?;
                        current.clear();
                    }
                    negative = ch == '-';
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_term(&current, negative, &mut terms, &mut modifier)?;
        }

        if terms.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            terms,
            modifier,
            original: notation,
        })
    }

    /// An expression that always rolls `value`.
    pub fn constant(value: i32) -> Self {
        DiceExpression {
            terms: Vec::new(),
            modifier: value,
            original: value.to_string(),
        }
    }

    fn parse_term(
        s: &str,
        negative: bool,
        terms: &mut Vec<DiceTerm>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let Some(d_pos) = s.find('d') else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            let signed = if negative { -value } else { value };
            *modifier = modifier
                .checked_add(signed)
                .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;
            return Ok(());
        };

        let count_str = &s[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
        };
        if count == 0 {
            return Err(DiceError::InvalidNotation(s.to_string()));
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice(count));
        }

        let sides: u32 = s[d_pos + 1..]
            .parse()
            .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
        let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        terms.push(DiceTerm {
            count,
            die_type,
            negative,
        });
        Ok(())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> DiceRoll {
        let mut rolls = Vec::new();
        let mut total = self.modifier;

        for term in &self.terms {
            for _ in 0..term.count {
                let value = rng.gen_range(1..=term.die_type.sides());
                rolls.push(value);
                let value = value as i32;
                total = if term.negative {
                    total.saturating_sub(value)
                } else {
                    total.saturating_add(value)
                };
            }
        }

        DiceRoll {
            notation: self.original.clone(),
            rolls,
            total,
        }
    }

    /// Lowest and highest totals this expression can produce.
    pub fn bounds(&self) -> (i32, i32) {
        self.terms
            .iter()
            .fold((self.modifier, self.modifier), |(lo, hi), term| {
                let count = term.count as i32;
                let sides = term.die_type.sides() as i32;
                if term.negative {
                    (lo.saturating_sub(count * sides), hi.saturating_sub(count))
                } else {
                    (lo.saturating_add(count), hi.saturating_add(count * sides))
                }
            })
    }

    pub fn notation(&self) -> &str {
        &self.original
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl TryFrom<String> for DiceExpression {
    type Error = DiceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DiceExpression::parse(&s)
    }
}

impl From<DiceExpression> for String {
    fn from(expr: DiceExpression) -> Self {
        expr.original
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub notation: String,
    pub rolls: Vec<u32>,
    pub total: i32,
}

impl DiceRoll {
    /// The total as damage: negative totals count as zero.
    pub fn damage(&self) -> i32 {
        self.total.max(0)
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rolls = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} [{}] = {}", self.notation, rolls, self.total)
    }
}
