//! Core ledger functionality
//!
//! Blocks and their lifecycle, rule resolution, atomic transactions, deferred
//! syntax checks, the local chain, the reward trigger and the engine that
//! ties them together.

pub mod atomic;
pub mod block;
pub mod blockchain;
pub mod bonus;
pub mod context;
pub mod deferred;
pub mod engine;
pub mod ids;
pub mod monetary;
pub mod rewards;
pub mod rules;
pub mod validator;

pub use block::{Block, BlockBody, Status};
pub use blockchain::{Blockchain, LocalChain, LAST_ACCEPTED_KEY};
pub use bonus::BonusBlocks;
pub use context::{ChainContext, PostAcceptHook};
pub use deferred::DeferredChecks;
pub use engine::Engine;
pub use ids::{Address, Id, ShortId};
pub use monetary::SUBUNITS_PER_UNIT;
pub use rewards::{reward_preview, RewardPreview};
pub use rules::{RuleResolver, Rules};
pub use validator::{BlockValidator, SyntacticBlockValidator};
