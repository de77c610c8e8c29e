//! End-to-end session tests over a scripted engine.

use std::cell::RefCell;
use std::collections::HashSet;

use colloquy_abi::{Error, EngineFault, InferenceEngine, SamplingConfig, Token, TokenBatch};
use colloquy_core::{ChatSession, FinishReason, TemplateKind};

/// Scripted engine: fixed tokenization, a queue of logit vectors served in
/// `forward` order, a token → fragment table, and an optional forward call
/// that fails.
struct MockEngine {
    /// What `tokenize` returns for any text.
    prompt_tokens: Vec<Token>,
    /// Logits visible after the n-th `forward` call (1-based); the last
    /// entry repeats once the script runs out.
    logit_script: Vec<Vec<f32>>,
    /// token id → decoded fragment.
    fragments: Vec<&'static str>,
    eog: HashSet<i32>,
    /// 1-based index of the `forward` call that fails, if any.
    fail_on_call: Option<usize>,
    n_ctx: Option<usize>,
    tokenize_fails: bool,
    /// When set, `tokenize` yields one token per input byte instead of the
    /// fixed list (for budget-pruning tests).
    len_tokenize: bool,
    forward_calls: usize,
}

impl MockEngine {
    fn new(logit_script: Vec<Vec<f32>>, fragments: Vec<&'static str>) -> Self {
        Self {
            prompt_tokens: vec![Token(1), Token(2), Token(3)],
            logit_script,
            fragments,
            eog: HashSet::from([9]),
            fail_on_call: None,
            n_ctx: None,
            tokenize_fails: false,
            len_tokenize: false,
            forward_calls: 0,
        }
    }

    /// Build a logit vector with all mass on `winner`.
    fn favoring(winner: usize, vocab: usize) -> Vec<f32> {
        let mut logits = vec![0.0f32; vocab];
        logits[winner] = 100.0;
        logits
    }
}

impl InferenceEngine for MockEngine {
    fn tokenize(
        &self,
        text: &str,
        _add_leading_marker: bool,
        _parse_markup: bool,
    ) -> Result<Vec<Token>, Error> {
        if self.tokenize_fails {
            return Err(Error::Tokenization("engine reported -1".into()));
        }
        if self.len_tokenize {
            return Ok(vec![Token(1); text.len()]);
        }
        Ok(self.prompt_tokens.clone())
    }

    fn forward(&mut self, _batch: TokenBatch<'_>) -> Result<(), EngineFault> {
        self.forward_calls += 1;
        if self.fail_on_call == Some(self.forward_calls) {
            return Err(EngineFault("decode returned status 1".into()));
        }
        Ok(())
    }

    fn last_logits(&self) -> &[f32] {
        let idx = self
            .forward_calls
            .saturating_sub(1)
            .min(self.logit_script.len() - 1);
        &self.logit_script[idx]
    }

    fn detokenize_fragment(&self, token: Token) -> String {
        self.fragments
            .get(token.0 as usize)
            .copied()
            .unwrap_or("")
            .to_string()
    }

    fn is_end_of_generation(&self, token: Token) -> bool {
        self.eog.contains(&token.0)
    }

    fn context_window_hint(&self) -> Option<usize> {
        self.n_ctx
    }
}

fn terse_config() -> SamplingConfig {
    SamplingConfig {
        max_tokens: 5,
        seed: Some(7),
        ..Default::default()
    }
}

const VOCAB: usize = 10;

/// Engine favors "4" then an end-of-generation token: one streamed
/// fragment, one committed assistant turn.
#[test]
fn terse_reply_streams_one_fragment_and_commits_the_turn() {
    let engine = MockEngine::new(
        vec![
            MockEngine::favoring(4, VOCAB), // after prefill: pick "4"
            MockEngine::favoring(9, VOCAB), // after step 1: pick EOG
        ],
        vec!["", "", "", "", "4", "", "", "", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    session.set_system_prompt("You are terse.");

    let fragments = RefCell::new(Vec::<String>::new());
    let reply = session
        .prompt("2+2?", &terse_config(), |f| {
            fragments.borrow_mut().push(f.to_string())
        })
        .unwrap();

    assert_eq!(fragments.into_inner(), vec!["4".to_string()]);
    assert_eq!(reply.text, "4");
    assert_eq!(reply.finish, FinishReason::EndOfGeneration);
    assert_eq!(reply.tokens, 1);

    let turns = session.conversation().turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[2].content, "4");
}

/// `forward` fails on the third decode step after "Hel" and "lo" were
/// streamed; the partial "Hello" survives and the conversation stays put.
#[test]
fn decode_failure_preserves_partial_and_rolls_back() {
    let mut engine = MockEngine::new(
        vec![
            MockEngine::favoring(5, VOCAB), // "Hel"
            MockEngine::favoring(6, VOCAB), // "lo"
            MockEngine::favoring(7, VOCAB), // never delivered
        ],
        vec!["", "", "", "", "", "Hel", "lo", "x", "", ""],
    );
    // Call 1 = prefill, 2-3 = first two decode steps, 4 = third (fails).
    engine.fail_on_call = Some(4);

    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    session.set_system_prompt("sys");
    let before = session.conversation().turns().to_vec();

    let fragments = RefCell::new(Vec::<String>::new());
    let config = SamplingConfig {
        max_tokens: 20,
        ..terse_config()
    };
    let err = session
        .prompt("hi", &config, |f| {
            fragments.borrow_mut().push(f.to_string())
        })
        .unwrap_err();

    assert_eq!(fragments.into_inner(), vec!["Hel".to_string(), "lo".to_string()]);
    match &err {
        Error::Decode { partial, .. } => assert_eq!(partial, "Hello"),
        other => panic!("expected decode error, got {other:?}"),
    }
    assert_eq!(err.partial_output(), Some("Hello"));
    assert_eq!(session.conversation().turns(), &before[..]);
}

#[test]
fn tokenization_failure_mutates_nothing_and_emits_nothing() {
    let mut engine = MockEngine::new(
        vec![MockEngine::favoring(9, VOCAB)],
        vec![""; VOCAB],
    );
    engine.tokenize_fails = true;

    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    session.set_system_prompt("sys");
    let before = session.conversation().turns().to_vec();

    let called = RefCell::new(false);
    let err = session
        .prompt("hi", &terse_config(), |_| *called.borrow_mut() = true)
        .unwrap_err();

    assert!(matches!(err, Error::Tokenization(_)));
    assert!(!*called.borrow());
    assert_eq!(session.conversation().turns(), &before[..]);
}

/// A stop marker split across two sampled tokens truncates at the marker.
#[test]
fn split_stop_marker_truncates_the_reply() {
    let engine = MockEngine::new(
        vec![
            MockEngine::favoring(5, VOCAB), // "Hi"
            MockEngine::favoring(6, VOCAB), // "\nUs"
            MockEngine::favoring(7, VOCAB), // "er: next?"
        ],
        vec!["", "", "", "", "", "Hi", "\nUs", "er: next?", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    session.set_stop_markers(vec!["\nUser:".into()]);

    let fragments = RefCell::new(Vec::<String>::new());
    let config = SamplingConfig {
        max_tokens: 20,
        ..terse_config()
    };
    let reply = session
        .prompt("hello", &config, |f| {
            fragments.borrow_mut().push(f.to_string())
        })
        .unwrap();

    assert_eq!(reply.text, "Hi");
    assert_eq!(reply.finish, FinishReason::StopMarker);
    assert_eq!(fragments.into_inner(), vec!["Hi".to_string()]);
    // Truncated reply is what the conversation remembers.
    let turns = session.conversation().turns();
    assert_eq!(turns.last().unwrap().content, "Hi");
}

/// Control-token text is kept out of the stream without ending the turn.
#[test]
fn special_fragments_are_suppressed_but_generation_continues() {
    let engine = MockEngine::new(
        vec![
            MockEngine::favoring(5, VOCAB), // "A"
            MockEngine::favoring(6, VOCAB), // "<|start_header_id|>"
            MockEngine::favoring(7, VOCAB), // "B"
            MockEngine::favoring(9, VOCAB), // EOG
        ],
        vec!["", "", "", "", "", "A", "<|start_header_id|>", "B", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);

    let fragments = RefCell::new(Vec::<String>::new());
    let config = SamplingConfig {
        max_tokens: 20,
        ..terse_config()
    };
    let reply = session
        .prompt("q", &config, |f| {
            fragments.borrow_mut().push(f.to_string())
        })
        .unwrap();

    assert_eq!(reply.text, "AB");
    assert_eq!(reply.finish, FinishReason::EndOfGeneration);
    assert_eq!(fragments.into_inner(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn position_budget_counts_prompt_and_generated_tokens() {
    // Prompt is 3 tokens; max_tokens 5 leaves room for exactly 2 steps.
    let engine = MockEngine::new(
        vec![MockEngine::favoring(5, VOCAB)],
        vec!["", "", "", "", "", "a", "", "", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);

    let reply = session.ask("q", &terse_config()).unwrap();
    assert_eq!(reply.finish, FinishReason::TokenBudget);
    assert_eq!(reply.tokens, 2);
    assert_eq!(reply.text, "aa");
}

#[test]
fn cancellation_is_a_clean_terminal_that_commits_partial_text() {
    let engine = MockEngine::new(
        vec![MockEngine::favoring(5, VOCAB)],
        vec!["", "", "", "", "", "a", "", "", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    let handle = session.stop_handle();

    let config = SamplingConfig {
        max_tokens: 1000,
        ..terse_config()
    };
    // Cancel from inside the consumer after the first fragment arrives.
    let reply = session
        .prompt("q", &config, |_| {
            handle.store(true, std::sync::atomic::Ordering::Relaxed)
        })
        .unwrap();

    assert_eq!(reply.finish, FinishReason::Cancelled);
    assert_eq!(reply.tokens, 1);
    assert_eq!(reply.text, "a");
    // Clean terminal: the partial assistant turn is committed.
    let turns = session.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "a");
}

#[test]
fn invalid_config_is_rejected_before_any_engine_call() {
    let engine = MockEngine::new(
        vec![MockEngine::favoring(9, VOCAB)],
        vec![""; VOCAB],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);

    let config = SamplingConfig {
        top_p: 2.0,
        ..terse_config()
    };
    let err = session.ask("q", &config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(session.conversation().is_empty());
}

#[test]
fn stateless_generate_leaves_the_conversation_alone() {
    let engine = MockEngine::new(
        vec![
            MockEngine::favoring(5, VOCAB),
            MockEngine::favoring(9, VOCAB),
        ],
        vec!["", "", "", "", "", "ok", "", "", "", ""],
    );
    let mut session = ChatSession::new(engine, TemplateKind::Llama3);

    let reply = session
        .generate("<raw prompt>", &terse_config(), |_| {})
        .unwrap();
    assert_eq!(reply.text, "ok");
    assert!(session.conversation().turns().is_empty());
}

/// When the rendered prompt overflows the context budget, the oldest
/// (user, assistant) pair is dropped; the system turn survives.
#[test]
fn overlong_dialog_is_pruned_before_generation() {
    let mut engine = MockEngine::new(
        vec![MockEngine::favoring(9, VOCAB)], // immediate end-of-generation
        vec![""; VOCAB],
    );
    engine.len_tokenize = true;
    engine.n_ctx = Some(400); // prompt budget = 300 tokens (75%)

    let mut session = ChatSession::new(engine, TemplateKind::Llama3);
    session.set_system_prompt("s");
    // Restore an aged exchange too large to keep alongside a new turn.
    session.conversation_mut().push_user("x".repeat(200));
    session.conversation_mut().push_assistant("y".repeat(200));

    let config = SamplingConfig {
        max_tokens: 400,
        ..terse_config()
    };
    let reply = session.ask("fresh question", &config).unwrap();
    assert_eq!(reply.finish, FinishReason::EndOfGeneration);

    let turns = session.conversation().turns();
    assert_eq!(turns[0].role, colloquy_abi::Role::System);
    assert!(
        turns.iter().all(|t| !t.content.starts_with("xxx")),
        "oversized pair should have been pruned"
    );
    // system + fresh user + (empty) assistant reply
    assert_eq!(turns.len(), 3);
}

#[test]
fn seeded_runs_reproduce_the_same_reply() {
    // Flat-ish logits so the draw actually exercises the RNG.
    let spread = |bias: usize| {
        let mut l = vec![1.0f32; VOCAB];
        l[bias] = 2.0;
        l[9] = f32::NEG_INFINITY; // keep EOG out of the draw
        l
    };
    let run = |seed: u64| {
        let engine = MockEngine::new(
            vec![spread(5), spread(6), spread(7), spread(8)],
            vec!["", "", "", "", "", "a", "b", "c", "d", ""],
        );
        let mut session = ChatSession::new(engine, TemplateKind::Llama3);
        let config = SamplingConfig {
            max_tokens: 7,
            temperature: 1.0,
            top_k: 0,
            top_p: 1.0,
            seed: Some(seed),
            ..Default::default()
        };
        session.ask("q", &config).unwrap().text
    };

    assert_eq!(run(42), run(42));
}
