//! Pre-run cost estimate for a batch of papers.

use serde::{Deserialize, Serialize};

use crate::backend::Provider;

/// Assumed completion length per paper.
pub const OUTPUT_TOKENS_PER_PAPER: u64 = 500;
/// Used when the real paper lengths are not known yet.
pub const DEFAULT_AVG_CHARS_PER_PAPER: usize = 50_000;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    pub const ANTHROPIC: Pricing = Pricing { input_per_million: 3.0, output_per_million: 15.0 };
    pub const OPENAI:    Pricing = Pricing { input_per_million: 2.5, output_per_million: 10.0 };

    pub fn for_provider(provider: Provider) -> Pricing {
        match provider {
            Provider::Anthropic        => Pricing::ANTHROPIC,
            Provider::OpenAi           => Pricing::OPENAI,
            // Self-hosted endpoints have no per-token price
            Provider::OpenAiCompatible => Pricing { input_per_million: 0.0, output_per_million: 0.0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub num_papers: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Input tokens ≈ characters / 4; output is a flat allowance per paper.
pub fn estimate_cost(num_papers: usize, avg_chars_per_paper: usize, pricing: Pricing) -> CostEstimate {
    let input_tokens = (num_papers as u64 * avg_chars_per_paper as u64) / 4;
    let output_tokens = num_papers as u64 * OUTPUT_TOKENS_PER_PAPER;
    let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input_per_million;
    let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output_per_million;

    CostEstimate {
        num_papers,
        input_tokens,
        output_tokens,
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    }
}

impl std::fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "~${:.2} for {} papers (input ${:.2} / {} tokens, output ${:.2} / {} tokens)",
            self.total_cost,
            self.num_papers,
            self.input_cost,
            self.input_tokens,
            self.output_cost,
            self.output_tokens,
        )
    }
}
