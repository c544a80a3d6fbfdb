//! Usage accounting shared by runtimes and pricing policies.

use serde::{Deserialize, Serialize};

/// Unit a usage quantity is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageUnit {
    Tokens,
    Characters,
    Requests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDimension {
    pub unit: UsageUnit,
    pub quantity: u64,
}

impl UsageDimension {
    pub fn tokens(quantity: u64) -> Self {
        Self {
            unit: UsageUnit::Tokens,
            quantity,
        }
    }

    pub fn characters(quantity: u64) -> Self {
        Self {
            unit: UsageUnit::Characters,
            quantity,
        }
    }
}

/// How much the estimate should be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// What the usage refers to, e.g. 40 "items".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageScope {
    pub unit: String,
    pub count: usize,
}

impl UsageScope {
    pub fn items(count: usize) -> Self {
        Self {
            unit: "items".to_string(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub scope: UsageScope,
    #[serde(default)]
    pub inputs: Vec<UsageDimension>,
    #[serde(default)]
    pub outputs: Vec<UsageDimension>,
    pub confidence: Confidence,
}

impl UsageBreakdown {
    /// Token usage for `items` items.
    pub fn tokens(items: usize, input: u64, output: u64, confidence: Confidence) -> Self {
        Self {
            scope: UsageScope::items(items),
            inputs: vec![UsageDimension::tokens(input)],
            outputs: vec![UsageDimension::tokens(output)],
            confidence,
        }
    }

    /// Total input quantity in `unit`, if measured.
    pub fn input(&self, unit: UsageUnit) -> Option<u64> {
        sum_unit(&self.inputs, unit)
    }

    /// Total output quantity in `unit`, if measured.
    pub fn output(&self, unit: UsageUnit) -> Option<u64> {
        sum_unit(&self.outputs, unit)
    }
}

fn sum_unit(dimensions: &[UsageDimension], unit: UsageUnit) -> Option<u64> {
    dimensions
        .iter()
        .filter(|d| d.unit == unit)
        .map(|d| d.quantity)
        .reduce(|a, b| a + b)
}

/// A usage figure together with its price, when one can be derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEstimate {
    pub usage: UsageBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_totals() {
        let usage = UsageBreakdown {
            scope: UsageScope::items(3),
            inputs: vec![
                UsageDimension::tokens(100),
                UsageDimension::tokens(20),
                UsageDimension::characters(400),
            ],
            outputs: vec![],
            confidence: Confidence::Low,
        };
        assert_eq!(usage.input(UsageUnit::Tokens), Some(120));
        assert_eq!(usage.input(UsageUnit::Characters), Some(400));
        assert_eq!(usage.input(UsageUnit::Requests), None);
        assert_eq!(usage.output(UsageUnit::Tokens), None);
    }
}
