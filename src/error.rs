//! Error types for the pick-up game service
//!
//! Domain errors carry the exact text that is sent back to the requester as a
//! private notice. Service-level plumbing uses anyhow like the rest of the
//! crate.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result type for operations that report failures back over chat
pub type PugResult<T> = std::result::Result<T, PugError>;

/// Broad classes of failure, used for logging and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input from a player; reported privately, no state change
    UserInput,
    /// Action requested in the wrong lifecycle state; reported privately
    Precondition,
    /// An external service misbehaved
    Collaborator,
    /// Invalid configuration
    Configuration,
    /// Bug or poisoned lock
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UserInput => "user_input",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Collaborator => "collaborator",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Custom error types for specific pick-up game scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PugError {
    // User input
    #[error("No classes entered. Usage: !add {options}")]
    NoClasses { options: String },

    #[error("Invalid classes. Possible options are {options}")]
    NoValidClasses { options: String },

    #[error("You are already added as {classes}.")]
    DuplicateSignup { classes: String },

    #[error("The pug is full. Wait for the next game.")]
    QueueFull,

    #[error("You are not added.")]
    NotSignedUp,

    #[error("It is not your turn to pick.")]
    NotYourTurn,

    #[error("Invalid class {class}.")]
    InvalidClass { class: String },

    #[error("The class {class} is full.")]
    ClassFull { class: String },

    #[error("Could not find {target}.")]
    PlayerNotFound { target: String },

    #[error("{player} has already been picked.")]
    AlreadyPicked { player: String },

    #[error("{player} is already playing in this pug.")]
    AlreadyPlaying { player: String },

    #[error("Only admins can use !{command}.")]
    NotAdmin { command: String },

    #[error("Usage: {usage}")]
    Usage { usage: String },

    #[error("You are restricted from playing in this channel.")]
    Restricted,

    #[error("No players are available to play {class}.")]
    NoPlayersForClass { class: String },

    // Preconditions
    #[error("Picking has not started.")]
    PickingNotStarted,

    #[error("You cannot add at this time.")]
    CannotAdd,

    #[error("You cannot remove at this time.")]
    CannotRemove,

    #[error("Not enough captains to start the draft (need {needed}, have {available}).")]
    NotEnoughCaptains { needed: usize, available: usize },

    // Collaborators
    #[error("Identity service failure: {message}")]
    IdentityFailed { message: String },

    #[error("Match recording failed: {message}")]
    PersistenceFailed { message: String },

    #[error("Game server could not be started: {message}")]
    ProvisioningFailed { message: String },

    #[error("Chat delivery failed: {message}")]
    TransportFailed { message: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    // Everything else
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl PugError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PugError::NoClasses { .. }
            | PugError::NoValidClasses { .. }
            | PugError::DuplicateSignup { .. }
            | PugError::QueueFull
            | PugError::NotSignedUp
            | PugError::NotYourTurn
            | PugError::InvalidClass { .. }
            | PugError::ClassFull { .. }
            | PugError::PlayerNotFound { .. }
            | PugError::AlreadyPicked { .. }
            | PugError::AlreadyPlaying { .. }
            | PugError::NotAdmin { .. }
            | PugError::Usage { .. }
            | PugError::Restricted
            | PugError::NoPlayersForClass { .. } => ErrorKind::UserInput,
            PugError::PickingNotStarted
            | PugError::CannotAdd
            | PugError::CannotRemove
            | PugError::NotEnoughCaptains { .. } => ErrorKind::Precondition,
            PugError::IdentityFailed { .. }
            | PugError::PersistenceFailed { .. }
            | PugError::ProvisioningFailed { .. }
            | PugError::TransportFailed { .. }
            | PugError::AmqpConnectionFailed { .. } => ErrorKind::Collaborator,
            PugError::ConfigurationError { .. } => ErrorKind::Configuration,
            PugError::InternalError { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error should be reported back to the player who caused it
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::UserInput | ErrorKind::Precondition)
    }
}
