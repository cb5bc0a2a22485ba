// Toxicity scoring — trait-based abstraction for swappable classifiers.
//
// The ToxicityScorer trait is all the filters depend on. PerspectiveScorer
// implements it against Google's Perspective API; tests plug in fixed
// scorers so no network is needed.

pub mod perspective;
pub mod traits;
