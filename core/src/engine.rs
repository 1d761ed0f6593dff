use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::*;

/// Recurring tick driving `elapsed_seconds` while a game is underway.
const CLOCK_TICK: Duration = Duration::from_secs(1);

/// How long a mismatched pair stays face-up before auto-hiding.
const MISMATCH_HIDE_DELAY: Duration = Duration::from_millis(600);

/// A resolve attempt holds at most two face-up tokens.
const ATTEMPT_SLOTS: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineState {
    Ready,
    Active,
    Won,
}

impl EngineState {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won)
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::Ready
    }
}

fn lock_core(shared: &Mutex<EngineCore>) -> MutexGuard<'_, EngineCore> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct EngineCore {
    config: GameConfig,
    deck: Vec<Token>,
    revealed: SmallVec<[TokenId; ATTEMPT_SLOTS]>,
    moves: u32,
    matched_pairs: TokenCount,
    elapsed_seconds: u32,
    clock_running: bool,
    state: EngineState,
    /// Bumped on every restart; callbacks scheduled against an older
    /// generation must not touch the current deck.
    generation: u64,
    clock_task: Option<TaskHandle>,
    hide_task: Option<TaskHandle>,
    notifier: Notifier,
    generator: Box<dyn DeckGenerator + Send>,
}

impl EngineCore {
    fn token(&self, id: TokenId) -> Option<&Token> {
        self.deck.iter().find(|token| token.id() == id)
    }

    fn status(&self) -> Status {
        Status {
            moves: self.moves,
            matched_pairs: self.matched_pairs,
            total_pairs: self.config.total_pairs(),
            elapsed_seconds: self.elapsed_seconds,
        }
    }

    fn emit_render(&mut self) {
        let frame = RenderFrame {
            deck: self.deck.clone(),
            revealed_ids: self.revealed.to_vec(),
        };
        self.notifier.emit(GameEvent::Render(frame));
    }

    fn emit_update(&mut self) {
        let status = self.status();
        self.notifier.emit(GameEvent::Update(status));
    }

    fn stop_clock(&mut self) {
        self.clock_running = false;
        self.clock_task = None;
    }

    /// Both revealed tokens carry the same pair value; lock them in.
    fn resolve_match(&mut self) {
        for id in self.revealed.clone() {
            if let Some(token) = self.deck.iter_mut().find(|token| token.id() == id) {
                token.set_matched();
            }
        }
        self.matched_pairs += 1;
        self.revealed.clear();
        self.emit_update();

        if self.matched_pairs == self.config.total_pairs() {
            log::debug!("All {} pairs matched in {} moves", self.matched_pairs, self.moves);
            self.stop_clock();
            self.state = EngineState::Won;
            let status = self.status();
            self.notifier.emit(GameEvent::Win(status));
        }
    }

    /// Discard the old game wholesale and build a fresh shuffled deck.
    fn reset(&mut self, config: GameConfig) {
        self.generation += 1;
        self.stop_clock();
        self.hide_task = None;
        self.config = config;
        self.deck = self.generator.generate(config);
        self.revealed.clear();
        self.moves = 0;
        self.matched_pairs = 0;
        self.elapsed_seconds = 0;
        self.state = EngineState::Ready;
        self.emit_render();
        self.emit_update();
    }
}

/// The game state machine: owns the deck, the current attempt, the
/// counters, and the clock, and notifies observers on every observable
/// change.
///
/// All transitions (reveal calls, clock ticks, the deferred mismatch-hide)
/// serialize through one internal lock. Notification handlers run under
/// that lock and must not call back into the engine.
pub struct MatchEngine {
    shared: Arc<Mutex<EngineCore>>,
    scheduler: Arc<dyn Scheduler>,
}

impl MatchEngine {
    /// Entropy-seeded engine on the wall-clock scheduler.
    pub fn new(config: GameConfig) -> Result<Self> {
        Self::with_parts(config, ShuffledDeckGenerator::new(), Arc::new(ThreadScheduler))
    }

    /// Fails with [`GameError::InvalidConfiguration`] before any state is
    /// built; no partial engine exists on error.
    pub fn with_parts(
        config: GameConfig,
        generator: impl DeckGenerator + Send + 'static,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;

        let mut generator: Box<dyn DeckGenerator + Send> = Box::new(generator);
        let deck = generator.generate(config);
        let core = EngineCore {
            config,
            deck,
            revealed: SmallVec::new(),
            moves: 0,
            matched_pairs: 0,
            elapsed_seconds: 0,
            clock_running: false,
            state: EngineState::default(),
            generation: 0,
            clock_task: None,
            hide_task: None,
            notifier: Notifier::default(),
            generator,
        };
        let engine = Self {
            shared: Arc::new(Mutex::new(core)),
            scheduler,
        };

        let mut core = engine.lock();
        core.emit_render();
        core.emit_update();
        drop(core);

        Ok(engine)
    }

    fn lock(&self) -> MutexGuard<'_, EngineCore> {
        lock_core(&self.shared)
    }

    pub fn on_render(&self, handler: impl FnMut(RenderFrame) + Send + 'static) {
        self.lock().notifier.on_render(handler);
    }

    pub fn on_update(&self, handler: impl FnMut(Status) + Send + 'static) {
        self.lock().notifier.on_update(handler);
    }

    pub fn on_win(&self, handler: impl FnMut(Status) + Send + 'static) {
        self.lock().notifier.on_win(handler);
    }

    /// Reveal a token and, on the second token of an attempt, resolve it.
    ///
    /// Redundant or late calls are absorbed silently: unknown ids, matched
    /// tokens, duplicate clicks, clicks after the game is won, and any
    /// click while a mismatched pair is still pending its auto-hide.
    pub fn reveal(&self, token_id: TokenId) {
        let mut core = self.lock();

        if core.state.is_finished() {
            return;
        }
        // a pending mismatch blocks every new reveal, not just duplicates
        if core.revealed.len() >= ATTEMPT_SLOTS {
            return;
        }

        let Some(token) = core.token(token_id).copied() else {
            log::debug!("Ignoring reveal of unknown token {}", token_id);
            return;
        };
        if token.is_matched() || core.revealed.contains(&token_id) {
            return;
        }

        if !core.clock_running {
            self.start_clock(&mut core);
        }

        core.revealed.push(token_id);
        core.emit_render();

        if core.revealed.len() < ATTEMPT_SLOTS {
            core.emit_update();
            return;
        }

        core.moves += 1;
        let first = core
            .token(core.revealed[0])
            .copied()
            .expect("revealed ids always reference deck tokens");
        if first.pair_value() == token.pair_value() {
            core.resolve_match();
        } else {
            self.schedule_hide(&mut core);
        }
    }

    /// Abandon the current game and start over, optionally on new
    /// dimensions. Outstanding clock and hide tasks are cancelled so no
    /// stale callback lands on the fresh deck.
    pub fn restart(&self, config: Option<GameConfig>) -> Result<()> {
        let mut core = self.lock();
        let config = config.unwrap_or(core.config);
        config.validate()?;
        core.reset(config);
        Ok(())
    }

    fn start_clock(&self, core: &mut EngineCore) {
        if core.state.is_ready() {
            log::debug!("First reveal, starting clock");
            core.state = EngineState::Active;
        }
        core.clock_running = true;

        let generation = core.generation;
        let shared = Arc::downgrade(&self.shared);
        let handle = self.scheduler.interval(
            CLOCK_TICK,
            Box::new(move || {
                let Some(shared) = Weak::upgrade(&shared) else {
                    return;
                };
                let mut core = lock_core(&shared);
                if core.generation != generation || !core.clock_running {
                    return;
                }
                core.elapsed_seconds += 1;
                core.emit_update();
            }),
        );
        core.clock_task = Some(handle);
    }

    fn schedule_hide(&self, core: &mut EngineCore) {
        log::debug!(
            "Mismatch on {:?}, hiding in {}ms",
            core.revealed,
            MISMATCH_HIDE_DELAY.as_millis()
        );

        let generation = core.generation;
        let shared = Arc::downgrade(&self.shared);
        let handle = self.scheduler.timeout(
            MISMATCH_HIDE_DELAY,
            Box::new(move || {
                let Some(shared) = Weak::upgrade(&shared) else {
                    return;
                };
                let mut core = lock_core(&shared);
                if core.generation != generation {
                    return;
                }
                core.hide_task = None;
                core.revealed.clear();
                core.emit_render();
                core.emit_update();
            }),
        );
        core.hide_task = Some(handle);
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub fn config(&self) -> GameConfig {
        self.lock().config
    }

    /// Snapshot of the deck in layout order, for the initial paint before
    /// any notification has fired.
    pub fn deck(&self) -> Vec<Token> {
        self.lock().deck.clone()
    }

    pub fn revealed_ids(&self) -> Vec<TokenId> {
        self.lock().revealed.to_vec()
    }

    pub fn moves(&self) -> u32 {
        self.lock().moves
    }

    pub fn matched_pairs(&self) -> TokenCount {
        self.lock().matched_pairs
    }

    pub fn total_pairs(&self) -> TokenCount {
        self.lock().config.total_pairs()
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.lock().elapsed_seconds
    }

    pub fn status(&self) -> Status {
        self.lock().status()
    }
}

impl Drop for MatchEngine {
    fn drop(&mut self) {
        let mut core = self.lock();
        core.generation += 1;
        core.stop_clock();
        core.hide_task = None;
    }
}
