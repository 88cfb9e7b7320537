//! Gomoku Server library - room matchmaking and live game broadcast
//!
//! Real-time, two-player turn-based rooms for five-in-a-row on a 15x15
//! grid, served over a JSON command API with an SSE event stream.
//!
//! # Architecture
//!
//! - **Game**: pure board engine plus the per-room state machine
//! - **Registry**: room-id and player-id maps; one active room per player
//! - **Events**: closed event record set and the per-room fan-out bus
//! - **Service**: the command facade; the single serialization point per room
//! - **Server**: axum routes and the SSE push transport
//! - **Auth**: token-to-identity collaborator boundary
//!
//! # Example
//!
//! ```
//! use gomoku_server::GameService;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let service = GameService::new();
//! let room_id = service.create_room("u1", "alice")?;
//! service.join_room(&room_id, "u2", "bob")?;
//! service.start_game(&room_id, "u1")?;
//! service.make_move(&room_id, "u1", 7, 7)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod auth;
mod cli;
mod error;
mod events;
mod game;
mod registry;
mod room;
mod server;
mod service;

// Crate-level exports - identity boundary
pub use auth::{Identity, IdentityResolver, TokenTable};

// Crate-level exports - CLI
pub use cli::{Cli, Command};

// Crate-level exports - errors
pub use error::{ErrorKind, GameError};

// Crate-level exports - events
pub use events::{EventBus, GameEvent, SubscriberHandle, Subscription};

// Crate-level exports - game engine
pub use game::{BOARD_SIZE, Board, Cell, Color, GameState, GameStatus, Move, MoveOutcome, check_win, in_bounds};

// Crate-level exports - rooms and registry
pub use registry::{LeaveOutcome, RoomHandle, RoomRegistry};
pub use room::{GameStateView, Player, PlayerId, Room, RoomId, RoomSnapshot};

// Crate-level exports - service and HTTP surface
pub use server::{AppState, ApiError, ApiResponse, router, run};
pub use service::GameService;
