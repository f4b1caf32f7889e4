#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no active session")]
    NotConnected,
    #[error("{0}")]
    Msg(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a connect attempt is already pending")]
    AttemptPending,
    #[error("already connected to {0}")]
    AlreadyConnected(String),
    #[error("invalid address `{0}`, expected <host>:<port>")]
    InvalidAddress(String),
    #[error("connect request refused: {0}")]
    Refused(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("speed {0} is not one of 0, 20, 40, 60, 80, 100")]
    SpeedOutOfRange(u8),
    #[error("servo angle {0} is not a multiple of 45 within 0..=180")]
    AngleOutOfRange(u8),
    #[error("brightness {0} is outside 1..=7")]
    BrightnessOutOfRange(u8),
}
