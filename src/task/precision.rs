use std::{fmt, str::FromStr};

use crate::error::ConfigError;

/// Floating point width used by a task's buffers and shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecisionType {
    Float32,
    Float64,
}

impl PrecisionType {
    pub fn size_bytes(&self) -> u64 {
        match self {
            PrecisionType::Float32 => 4,
            PrecisionType::Float64 => 8,
        }
    }
}

impl FromStr for PrecisionType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(PrecisionType::Float32),
            "float64" | "f64" => Ok(PrecisionType::Float64),
            _ => Err(ConfigError::InvalidPrecision(s.to_string())),
        }
    }
}

impl fmt::Display for PrecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecisionType::Float32 => write!(f, "float32"),
            PrecisionType::Float64 => write!(f, "float64"),
        }
    }
}

/// Host-side element type of a task.
pub trait Scalar:
    bytemuck::Pod + Default + PartialEq + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const PRECISION: PrecisionType;

    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    fn parse(token: &str) -> Option<Self>;
}

impl Scalar for f32 {
    const PRECISION: PrecisionType = PrecisionType::Float32;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn parse(token: &str) -> Option<Self> {
        token.parse().ok()
    }
}

impl Scalar for f64 {
    const PRECISION: PrecisionType = PrecisionType::Float64;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn parse(token: &str) -> Option<Self> {
        token.parse().ok()
    }
}
