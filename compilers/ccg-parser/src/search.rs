//! The retry policy around parse attempts when a supertagger filters the
//! lexicon.

use tracing::debug;

use crate::config::BeamDirection;
use crate::supertagger::Supertagger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Lexical candidates are about to be filtered at a new beam.
    Filtering,
    Attempting,
    /// Retrying with the glue rule enabled.
    GlueFallback,
    Succeeded,
    Failed,
}

/// How one parse attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    LexiconFailure,
    NoAnalysis,
    LimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Loosen,
    Tighten,
    EnableGlue,
    Finish,
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct BeamSearch {
    direction: BeamDirection,
    glue: bool,
    state: SearchState,
    attempts: usize,
}

impl BeamSearch {
    pub fn new(direction: BeamDirection) -> Self {
        Self { direction, glue: false, state: SearchState::Filtering, attempts: 0 }
    }

    fn most_to_least(&self) -> bool {
        self.direction == BeamDirection::MostToLeastRestrictive
    }

    /// Puts the tagger's beam at the configured starting end.
    pub fn start(&mut self, tagger: &mut dyn Supertagger) {
        self.glue = false;
        self.attempts = 0;
        self.state = SearchState::Filtering;
        if self.most_to_least() {
            tagger.reset_beam();
        } else {
            tagger.reset_beam_to_loosest();
        }
    }

    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        if self.state == SearchState::Filtering {
            self.state = SearchState::Attempting;
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Whether the next attempt may use the glue rule.
    pub fn glue(&self) -> bool {
        self.glue
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Decides what follows an attempt and moves the tagger's beam to match.
    pub fn next(&mut self, outcome: AttemptOutcome, tagger: &mut dyn Supertagger) -> Transition {
        let transition = match outcome {
            AttemptOutcome::Success => Transition::Finish,
            AttemptOutcome::LexiconFailure => {
                if self.most_to_least() && tagger.has_looser_beam() {
                    Transition::Loosen
                } else {
                    Transition::GiveUp
                }
            }
            AttemptOutcome::NoAnalysis | AttemptOutcome::LimitExceeded => {
                let limited = outcome == AttemptOutcome::LimitExceeded;
                if self.most_to_least() && tagger.has_looser_beam() && !limited {
                    Transition::Loosen
                } else if !self.most_to_least() && tagger.has_tighter_beam() && limited {
                    Transition::Tighten
                } else if !self.glue {
                    Transition::EnableGlue
                } else {
                    Transition::GiveUp
                }
            }
        };

        match transition {
            Transition::Loosen => {
                tagger.loosen_beam();
                self.state = SearchState::Filtering;
            }
            Transition::Tighten => {
                tagger.tighten_beam();
                self.state = SearchState::Filtering;
            }
            Transition::EnableGlue => {
                tagger.reset_beam();
                self.glue = true;
                self.state = SearchState::GlueFallback;
            }
            Transition::Finish | Transition::GiveUp => {
                self.glue = false;
                tagger.clear_tokens();
                self.state = if transition == Transition::Finish {
                    SearchState::Succeeded
                } else {
                    SearchState::Failed
                };
            }
        }
        debug!(?outcome, ?transition, beam = tagger.current_beam_value(), "beam search step");
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supertagger::BetaSupertagger;

    fn tagger() -> BetaSupertagger {
        BetaSupertagger::new(vec![0.1, 0.01, 0.001])
    }

    #[test]
    fn test_loosens_on_lexicon_failure() {
        let mut tagger = tagger();
        let mut search = BeamSearch::new(BeamDirection::MostToLeastRestrictive);
        search.start(&mut tagger);
        search.begin_attempt();
        assert_eq!(search.state(), SearchState::Attempting);
        assert_eq!(search.next(AttemptOutcome::LexiconFailure, &mut tagger), Transition::Loosen);
        assert_eq!(search.state(), SearchState::Filtering);
        assert_eq!(tagger.current_beam_value(), 0.01);
        assert_eq!(search.next(AttemptOutcome::Success, &mut tagger), Transition::Finish);
        assert_eq!(search.state(), SearchState::Succeeded);
    }

    #[test]
    fn test_lexicon_failure_at_loosest_beam_gives_up() {
        let mut tagger = tagger();
        let mut search = BeamSearch::new(BeamDirection::MostToLeastRestrictive);
        search.start(&mut tagger);
        tagger.reset_beam_to_loosest();
        assert_eq!(search.next(AttemptOutcome::LexiconFailure, &mut tagger), Transition::GiveUp);
        assert_eq!(search.state(), SearchState::Failed);
    }

    #[test]
    fn test_limit_never_loosens() {
        let mut tagger = tagger();
        let mut search = BeamSearch::new(BeamDirection::MostToLeastRestrictive);
        search.start(&mut tagger);
        assert_eq!(search.next(AttemptOutcome::LimitExceeded, &mut tagger), Transition::EnableGlue);
        assert!(search.glue());
        assert_eq!(search.state(), SearchState::GlueFallback);
        assert_eq!(tagger.current_beam_value(), 0.1);
        assert_eq!(search.next(AttemptOutcome::LimitExceeded, &mut tagger), Transition::GiveUp);
        assert!(!search.glue());
    }

    #[test]
    fn test_least_to_most_tightens_on_limit() {
        let mut tagger = tagger();
        let mut search = BeamSearch::new(BeamDirection::LeastToMostRestrictive);
        search.start(&mut tagger);
        assert_eq!(tagger.current_beam_value(), 0.001);
        assert_eq!(search.next(AttemptOutcome::LimitExceeded, &mut tagger), Transition::Tighten);
        assert_eq!(tagger.current_beam_value(), 0.01);
        // No analysis is not a reason to tighten
        assert_eq!(search.next(AttemptOutcome::NoAnalysis, &mut tagger), Transition::EnableGlue);
        assert_eq!(tagger.current_beam_value(), 0.1);
    }

    #[test]
    fn test_no_analysis_sequence() {
        let mut tagger = tagger();
        let mut search = BeamSearch::new(BeamDirection::MostToLeastRestrictive);
        search.start(&mut tagger);
        let steps: Vec<Transition> =
            (0..5).map(|_| search.next(AttemptOutcome::NoAnalysis, &mut tagger)).collect();
        assert_eq!(
            steps,
            vec![
                Transition::Loosen,
                Transition::Loosen,
                Transition::EnableGlue,
                Transition::Loosen,
                Transition::Loosen,
            ]
        );
        assert_eq!(search.next(AttemptOutcome::NoAnalysis, &mut tagger), Transition::GiveUp);
    }
}
