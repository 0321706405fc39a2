use warp::{
    reject::{self, Reject},
    Filter,
};

use crate::controllers::GamificationController;
use crate::player_type::TestSession;
use crate::stores::MemoryStore;

#[derive(Debug)]
struct Unauthorized;

impl Reject for Unauthorized {}

pub fn with_controller(
    controller: GamificationController<MemoryStore>,
) -> impl Filter<Extract = (GamificationController<MemoryStore>,), Error = std::convert::Infallible>
       + Clone {
    warp::any().map(move || controller.clone())
}

/// Extracts the live test session from the `Authorization: TestSession ...`
/// header. Requests without a valid signed token are rejected.
pub fn test_session(
    controller: GamificationController<MemoryStore>,
) -> impl Filter<Extract = (TestSession,), Error = warp::Rejection> + Clone {
    warp::header::optional("Authorization")
        .and(with_controller(controller))
        .and_then(
            move |auth: Option<String>, controller: GamificationController<MemoryStore>| async move {
                let auth = auth.ok_or_else(|| reject::custom(Unauthorized))?;

                let mut parts = auth.splitn(2, ' ');
                let kind = parts.next().ok_or_else(|| reject::custom(Unauthorized))?;
                let value = parts.next().ok_or_else(|| reject::custom(Unauthorized))?;

                if !kind.eq_ignore_ascii_case("testsession") {
                    return Err(reject::custom(Unauthorized));
                }

                controller
                    .decode_session(value)
                    .map_err(|_err| reject::custom(Unauthorized))
            },
        )
}
