//! Answer judging policy.
//!
//! The dialogue only talks to `AnswerJudge`; the built-in policy accepts an answer with
//! a fixed probability and never looks at its content.

use rand::Rng;

pub trait AnswerJudge: Send + Sync {
  fn judge(&self, exercise: &str, answer: &str) -> bool;
}

#[derive(Clone, Debug)]
pub struct CoinFlipJudge {
  correct_probability: f64,
}

impl CoinFlipJudge {
  /// Probability is clamped into `[0, 1]`; NaN falls back to 0.5.
  pub fn new(correct_probability: f64) -> Self {
    let p = if correct_probability.is_nan() { 0.5 } else { correct_probability.clamp(0.0, 1.0) };
    Self { correct_probability: p }
  }

  pub fn correct_probability(&self) -> f64 {
    self.correct_probability
  }
}

impl Default for CoinFlipJudge {
  fn default() -> Self { Self::new(0.5) }
}

impl AnswerJudge for CoinFlipJudge {
  fn judge(&self, _exercise: &str, _answer: &str) -> bool {
    rand::thread_rng().gen_bool(self.correct_probability)
  }
}
