pub mod ledger;
pub mod repository;
pub mod service;
pub mod subject;

pub use ledger::{apply_vote, Direction, LedgerError, VoteOutcome, VoteSets, VoterState};
pub use repository::{SqliteVoteRepository, VoteRepository};
pub use service::{cast_vote, VoteError, VoteReceipt};
pub use subject::{SubjectKind, SubjectRef, Votable};
