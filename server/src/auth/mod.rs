pub mod clock;
pub mod gate;
pub mod signing_key;
pub mod token_codec;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::IdentityGate;
pub use signing_key::{EnvOrConfigSecret, KeyError, SecretSource, SigningKey};
pub use token_codec::{BearerToken, Principal, TOKEN_TTL, TokenCodec, TokenError, VerificationError};
