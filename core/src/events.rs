use serde::{Deserialize, Serialize};

use crate::{Token, TokenCount, TokenId};

/// Counter snapshot carried by `update` and `win` notifications.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub moves: u32,
    pub matched_pairs: TokenCount,
    pub total_pairs: TokenCount,
    pub elapsed_seconds: u32,
}

/// Everything a presentation layer needs to repaint the grid: the full
/// deck in layout order plus the ids currently face-up mid-attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub deck: Vec<Token>,
    pub revealed_ids: Vec<TokenId>,
}

/// Fixed set of notification kinds emitted by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Grid contents changed, repaint.
    Render(RenderFrame),
    /// Counters or clock changed.
    Update(Status),
    /// All pairs matched; fired once per game.
    Win(Status),
}

type RenderHandler = Box<dyn FnMut(RenderFrame) + Send>;
type StatusHandler = Box<dyn FnMut(Status) + Send>;

/// Holds at most one handler per notification kind and invokes them
/// synchronously in emission order. Registering a kind twice replaces the
/// previous handler.
#[derive(Default)]
pub struct Notifier {
    render: Option<RenderHandler>,
    update: Option<StatusHandler>,
    win: Option<StatusHandler>,
}

impl Notifier {
    pub fn on_render(&mut self, handler: impl FnMut(RenderFrame) + Send + 'static) {
        self.render = Some(Box::new(handler));
    }

    pub fn on_update(&mut self, handler: impl FnMut(Status) + Send + 'static) {
        self.update = Some(Box::new(handler));
    }

    pub fn on_win(&mut self, handler: impl FnMut(Status) + Send + 'static) {
        self.win = Some(Box::new(handler));
    }

    pub fn emit(&mut self, event: GameEvent) {
        match event {
            GameEvent::Render(frame) => {
                if let Some(handler) = &mut self.render {
                    handler(frame);
                }
            }
            GameEvent::Update(status) => {
                if let Some(handler) = &mut self.update {
                    handler(status);
                }
            }
            GameEvent::Win(status) => {
                if let Some(handler) = &mut self.win {
                    handler(status);
                }
            }
        }
    }
}
