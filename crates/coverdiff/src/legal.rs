//! Legal language attached to every API response.
//!
//! The comparison output is factual change detection, not advice. The
//! disclaimer text below is reviewed wording; do not edit it casually.

pub const LEGAL_DISCLAIMER: &str = "This tool provides automated detection and comparison of changes between your insurance policies. It reports factual differences found in the documents you upload and offers general educational information about insurance terms. This tool does not evaluate coverage adequacy, make recommendations, or provide legal or financial advice. The system analyzes only the two policy documents you upload. No external data, prior records, or third-party sources are used in the analysis. Always consult with your licensed insurance broker or provider to understand how these changes affect your specific business needs.";
