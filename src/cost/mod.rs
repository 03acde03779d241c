//! Cost Estimator
//!
//! Pure, side-effect-free projections of token usage and monetary cost per
//! pipeline phase, computed from crawled file sizes and chapter count. Token
//! figures use a fixed chars-per-token ratio and empirically calibrated
//! per-phase output constants; nothing here is measured at runtime.
//!
//! A read-only consumer of crawler output, independent of the orchestrator.

use serde::Serialize;

use crate::constants::cost as cost_constants;
use crate::types::FileEntry;

// =============================================================================
// Token Projections
// =============================================================================

/// Token projection for one pipeline phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTokens {
    pub phase: &'static str,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-phase token projections plus totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenBreakdown {
    pub phases: Vec<PhaseTokens>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

impl TokenBreakdown {
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }
}

/// Project input/output tokens per phase from total content size and the
/// expected chapter count.
pub fn estimate_tokens(files: &[FileEntry], chapter_count: usize) -> TokenBreakdown {
    let total_chars: u64 = files
        .iter()
        .map(|f| (f.path.len() + f.content.len()) as u64)
        .sum();

    let chars_to_tokens = |chars: f64| -> u64 {
        (chars / cost_constants::CHARS_PER_TOKEN * cost_constants::PROMPT_OVERHEAD).ceil() as u64
    };

    use cost_constants::output_tokens as out;

    let identify = PhaseTokens {
        phase: "identify_abstractions",
        input_tokens: chars_to_tokens(
            total_chars as f64 * cost_constants::SIGNATURE_RETENTION_RATIO,
        ),
        output_tokens: out::IDENTIFY_ABSTRACTIONS,
    };

    let relationships = PhaseTokens {
        phase: "analyze_relationships",
        input_tokens: chars_to_tokens(
            total_chars as f64 * cost_constants::RELATIONSHIP_CONTEXT_RATIO,
        ),
        output_tokens: out::ANALYZE_RELATIONSHIPS,
    };

    // Ordering consumes the abstraction and relationship listings, not code
    let order = PhaseTokens {
        phase: "order_chapters",
        input_tokens: out::IDENTIFY_ABSTRACTIONS + out::ANALYZE_RELATIONSHIPS,
        output_tokens: out::ORDER_CHAPTERS,
    };

    let chapters = PhaseTokens {
        phase: "write_chapters",
        input_tokens: chars_to_tokens(
            total_chars as f64 * cost_constants::CHAPTER_CONTEXT_RATIO * chapter_count as f64,
        ),
        output_tokens: out::PER_CHAPTER * chapter_count as u64,
    };

    let phases = vec![identify, relationships, order, chapters];
    let total_input_tokens = phases.iter().map(|p| p.input_tokens).sum();
    let total_output_tokens = phases.iter().map(|p| p.output_tokens).sum();

    TokenBreakdown {
        phases,
        total_input_tokens,
        total_output_tokens,
    }
}

// =============================================================================
// Model Pricing
// =============================================================================

/// Published per-1000-token pricing for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPricing {
    pub provider: &'static str,
    pub model: &'static str,
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Candidate models for cost comparison.
pub const PRICING_TABLE: &[ModelPricing] = &[
    ModelPricing {
        provider: "openai",
        model: "gpt-4o",
        input_per_1k: 0.0025,
        output_per_1k: 0.01,
    },
    ModelPricing {
        provider: "openai",
        model: "gpt-4o-mini",
        input_per_1k: 0.00015,
        output_per_1k: 0.0006,
    },
    ModelPricing {
        provider: "openai",
        model: "gpt-4-turbo",
        input_per_1k: 0.01,
        output_per_1k: 0.03,
    },
    ModelPricing {
        provider: "ollama",
        model: "llama3:latest",
        input_per_1k: 0.0,
        output_per_1k: 0.0,
    },
];

/// Look up pricing for a model name.
pub fn pricing_for_model(model: &str) -> Option<&'static ModelPricing> {
    PRICING_TABLE.iter().find(|p| p.model == model)
}

// =============================================================================
// Cost Calculation
// =============================================================================

/// A point estimate with a ±20% confidence band, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBand {
    pub low: f64,
    pub estimated: f64,
    pub high: f64,
}

/// Apply a model's pricing to a token breakdown.
pub fn calculate_cost(pricing: &ModelPricing, tokens: &TokenBreakdown) -> CostBand {
    let estimated = tokens.total_input_tokens as f64 / 1000.0 * pricing.input_per_1k
        + tokens.total_output_tokens as f64 / 1000.0 * pricing.output_per_1k;

    CostBand {
        low: estimated * (1.0 - cost_constants::BAND_RATIO),
        estimated,
        high: estimated * (1.0 + cost_constants::BAND_RATIO),
    }
}

/// One row of a cost comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelCost {
    pub provider: &'static str,
    pub model: &'static str,
    pub cost: CostBand,
}

/// Enumerate provider/model pairs and sort ascending by estimated cost.
///
/// An empty `providers` slice compares every known model.
pub fn compare_costs(
    files: &[FileEntry],
    chapter_count: usize,
    providers: &[&str],
) -> Vec<ModelCost> {
    let tokens = estimate_tokens(files, chapter_count);

    let mut costs: Vec<ModelCost> = PRICING_TABLE
        .iter()
        .filter(|p| providers.is_empty() || providers.contains(&p.provider))
        .map(|pricing| ModelCost {
            provider: pricing.provider,
            model: pricing.model,
            cost: calculate_cost(pricing, &tokens),
        })
        .collect();

    costs.sort_by(|a, b| {
        a.cost
            .estimated
            .partial_cmp(&b.cost.estimated)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    costs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<FileEntry> {
        vec![
            FileEntry::new("src/main.rs", "x".repeat(4_000)),
            FileEntry::new("src/lib.rs", "y".repeat(8_000)),
        ]
    }

    #[test]
    fn test_estimate_has_all_phases() {
        let breakdown = estimate_tokens(&sample_files(), 5);
        let names: Vec<&str> = breakdown.phases.iter().map(|p| p.phase).collect();
        assert_eq!(
            names,
            vec![
                "identify_abstractions",
                "analyze_relationships",
                "order_chapters",
                "write_chapters"
            ]
        );
        assert!(breakdown.total_input_tokens > 0);
        assert!(breakdown.total_output_tokens > 0);
    }

    #[test]
    fn test_estimate_scales_with_chapter_count() {
        let files = sample_files();
        let five = estimate_tokens(&files, 5);
        let ten = estimate_tokens(&files, 10);
        assert!(ten.total_output_tokens > five.total_output_tokens);
        assert!(ten.total_input_tokens > five.total_input_tokens);
    }

    #[test]
    fn test_estimate_is_pure() {
        let files = sample_files();
        assert_eq!(estimate_tokens(&files, 5), estimate_tokens(&files, 5));
    }

    #[test]
    fn test_cost_band_is_plus_minus_twenty_percent() {
        let pricing = pricing_for_model("gpt-4o").unwrap();
        let tokens = estimate_tokens(&sample_files(), 5);
        let band = calculate_cost(pricing, &tokens);

        assert!(band.estimated > 0.0);
        assert!((band.low - band.estimated * 0.8).abs() < 1e-9);
        assert!((band.high - band.estimated * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_compare_costs_sorted_ascending() {
        let costs = compare_costs(&sample_files(), 5, &[]);
        assert_eq!(costs.len(), PRICING_TABLE.len());
        for pair in costs.windows(2) {
            assert!(pair[0].cost.estimated <= pair[1].cost.estimated);
        }
        // The free local model always wins
        assert_eq!(costs[0].model, "llama3:latest");
    }

    #[test]
    fn test_compare_costs_filters_providers() {
        let costs = compare_costs(&sample_files(), 5, &["openai"]);
        assert!(costs.iter().all(|c| c.provider == "openai"));
        assert!(!costs.is_empty());
    }

    #[test]
    fn test_zero_files_still_projects_fixed_outputs() {
        let breakdown = estimate_tokens(&[], 3);
        assert!(breakdown.total_output_tokens > 0);
    }
}
