use anyhow::{Error, Result};
use rand::prelude::*;
use ring::{digest, hmac};
use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr};
use tokio::fs;
use warp::{
    http,
    reply::{self, Reply},
    Filter,
};

use controllers::{GamificationController, ResultWriter};
use models::Config;
use player_type::{TestSession, QUESTIONS};
use stores::MemoryStore;

mod badges;
mod controllers;
mod filters;
mod levels;
mod models;
mod player_type;
mod quests;
mod stores;

#[derive(Clone, Debug, Deserialize, Serialize)]
struct TakeTestRequest {
    user_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct TakeTestReply<'a> {
    questions: Vec<&'a str>,
    token: &'a str,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct SubmitAnswerRequest {
    question_id: usize,
    answer: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct SubmitAnswerReply<'a> {
    token: &'a str,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct CreatedReply {
    created: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ChapterReply {
    level: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct CreateRewardsRequest {
    content_id: String,
    name: String,
    level: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct FinishRequest {
    user_id: String,
    content_id: String,
    correct_answers: i64,
    total_answers: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct RenameRequest {
    name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct RemovedReply {
    removed: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ErrorReply {
    error: ErrorCode,

    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
enum ErrorCode {
    NotFound,
    InvalidAnswer,
}

fn not_found() -> warp::reply::Response {
    reply::with_status(
        reply::json(&ErrorReply {
            error: ErrorCode::NotFound,
            message: None,
        }),
        http::StatusCode::NOT_FOUND,
    )
    .into_response()
}

type Controller = GamificationController<MemoryStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let bind_addr = env::var("BIND").unwrap_or_else(|_err| "127.0.0.1:3030".into());
    let bind_addr: SocketAddr = bind_addr.parse()?;

    let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_err| "http://localhost:1313".into());

    let secret_key = env::var("SECRET_KEY")
        .map_err(|err| Error::new(err))
        .and_then(|env| {
            let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
            hex::decode_to_slice(env, &mut secret_key)?;
            Ok(secret_key)
        })
        .or_else(|_err| -> Result<_> {
            let mut secret_key = [0u8; digest::SHA256_OUTPUT_LEN];
            rand::rngs::OsRng.fill(&mut secret_key);

            println!("No secret key was specified, generated a new secret key.");
            println!("Rerun with SECRET_KEY={}", hex::encode(secret_key));

            Ok(secret_key)
        })?;

    let secret_key = hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_ref());

    let config = fs::read_to_string("gamification.toml")
        .await
        .unwrap_or_default();
    let config: Config = toml::de::from_str(&config)?;

    let result_writer = ResultWriter::new("results.csv")?;

    let controller =
        GamificationController::new(secret_key, config, MemoryStore::new(), Some(result_writer));

    let take_test = warp::path!("test")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(|body: TakeTestRequest, controller: Controller| {
            let session = controller.take_test(&body.user_id);
            let token = controller.encode_session(&session).unwrap();

            let reply = TakeTestReply {
                questions: QUESTIONS.to_vec(),
                token: &token,
            };

            reply::json(&reply).into_response()
        });

    let submit_answer = warp::path!("test" / "answer")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::test_session(controller.clone()))
        .and(filters::with_controller(controller.clone()))
        .map(
            |body: SubmitAnswerRequest, mut session: TestSession, controller: Controller| {
                match session.submit_answer(body.question_id, body.answer) {
                    Err(err) => reply::with_status(
                        reply::json(&ErrorReply {
                            error: ErrorCode::InvalidAnswer,
                            message: Some(err.to_string()),
                        }),
                        http::StatusCode::BAD_REQUEST,
                    )
                    .into_response(),
                    Ok(()) => {
                        let token = controller.encode_session(&session).unwrap();

                        let reply = SubmitAnswerReply { token: &token };

                        reply::json(&reply).into_response()
                    }
                }
            },
        );

    let evaluate_test = warp::path!("test" / "evaluate")
        .and(warp::post())
        .and(filters::test_session(controller.clone()))
        .and(filters::with_controller(controller.clone()))
        .and_then(|session: TestSession, controller: Controller| async move {
            let result = controller.evaluate_test(&session).await;

            Ok::<_, warp::Rejection>(reply::json(&result).into_response())
        });

    let test_result = warp::path!("test" / "result" / String)
        .and(warp::get())
        .and(filters::with_controller(controller.clone()))
        .map(|user_id: String, controller: Controller| {
            let result = controller.classifier_result_for(&user_id);

            reply::json(&result).into_response()
        });

    let add_course = warp::path!("courses" / String)
        .and(warp::post())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, controller: Controller| {
            let created = controller.add_course(&course_id);

            reply::json(&CreatedReply { created }).into_response()
        });

    let remove_course = warp::path!("courses" / String)
        .and(warp::delete())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, controller: Controller| {
            if controller.remove_course(&course_id) {
                reply::json(&RemovedReply { removed: true }).into_response()
            } else {
                not_found()
            }
        });

    let add_member = warp::path!("courses" / String / "members" / String)
        .and(warp::post())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, user_id: String, controller: Controller| {
            match controller.add_member(&course_id, &user_id) {
                None => not_found(),
                Some(user_chain) => reply::json(&user_chain).into_response(),
            }
        });

    let remove_member = warp::path!("courses" / String / "members" / String)
        .and(warp::delete())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, user_id: String, controller: Controller| {
            controller.remove_member(&course_id, &user_id);

            reply::json(&RemovedReply { removed: true }).into_response()
        });

    let add_chapter = warp::path!("courses" / String / "chapters")
        .and(warp::post())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, controller: Controller| {
            match controller.add_chapter(&course_id) {
                None => not_found(),
                Some(level) => reply::json(&ChapterReply { level }).into_response(),
            }
        });

    let create_quiz_rewards = warp::path!("courses" / String / "quizzes")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, body: CreateRewardsRequest, controller: Controller| {
                let created = controller.create_quiz_rewards(
                    &course_id,
                    &body.content_id,
                    &body.name,
                    body.level,
                );

                match created {
                    None => not_found(),
                    Some(badges) => reply::json(&badges).into_response(),
                }
            },
        );

    let create_flashcard_set_rewards = warp::path!("courses" / String / "flashcard-sets")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, body: CreateRewardsRequest, controller: Controller| {
                let created = controller.create_flashcard_set_rewards(
                    &course_id,
                    &body.content_id,
                    &body.name,
                    body.level,
                );

                match created {
                    None => not_found(),
                    Some(badges) => reply::json(&badges).into_response(),
                }
            },
        );

    let finish_quiz = warp::path!("courses" / String / "quizzes" / "finished")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, body: FinishRequest, controller: Controller| {
                let outcome = controller.finish_quiz(
                    &body.user_id,
                    &course_id,
                    &body.content_id,
                    body.correct_answers,
                    body.total_answers,
                );

                reply::json(&outcome).into_response()
            },
        );

    let finish_flashcard_set = warp::path!("courses" / String / "flashcard-sets" / "finished")
        .and(warp::post())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, body: FinishRequest, controller: Controller| {
                let outcome = controller.finish_flashcard_set(
                    &body.user_id,
                    &course_id,
                    &body.content_id,
                    body.correct_answers,
                    body.total_answers,
                );

                reply::json(&outcome).into_response()
            },
        );

    let current_quest = warp::path!("courses" / String / "quests" / String)
        .and(warp::get())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, user_id: String, controller: Controller| {
            match controller.current_quest(&user_id, &course_id) {
                None => not_found(),
                Some(quest) => reply::json(&quest).into_response(),
            }
        });

    let user_quest_chain = warp::path!("courses" / String / "quest-chain" / String)
        .and(warp::get())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, user_id: String, controller: Controller| {
            match controller.user_quest_chain(&user_id, &course_id) {
                None => not_found(),
                Some(user_chain) => reply::json(&user_chain).into_response(),
            }
        });

    let user_experience = warp::path!("courses" / String / "experience" / String)
        .and(warp::get())
        .and(filters::with_controller(controller.clone()))
        .map(|course_id: String, user_id: String, controller: Controller| {
            match controller.user_experience(&user_id, &course_id) {
                None => not_found(),
                Some(summary) => reply::json(&summary).into_response(),
            }
        });

    let rename_content = warp::path!("courses" / String / "contents" / String)
        .and(warp::put())
        .and(warp::filters::body::json())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, content_id: String, body: RenameRequest, controller: Controller| {
                if controller.rename_content(&course_id, &content_id, &body.name) {
                    reply::json(&RenameRequest { name: body.name }).into_response()
                } else {
                    not_found()
                }
            },
        );

    let remove_content = warp::path!("courses" / String / "contents" / String)
        .and(warp::delete())
        .and(filters::with_controller(controller.clone()))
        .map(
            |course_id: String, content_id: String, controller: Controller| {
                if controller.remove_content(&course_id, &content_id) {
                    reply::json(&RemovedReply { removed: true }).into_response()
                } else {
                    not_found()
                }
            },
        );

    let cors = warp::cors()
        .allow_origin(cors_origin.as_str())
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["Authorization", "Content-Type"]);

    let server = take_test
        .or(submit_answer)
        .or(evaluate_test)
        .or(test_result)
        .or(add_course)
        .or(remove_course)
        .or(add_member)
        .or(remove_member)
        .or(add_chapter)
        .or(create_quiz_rewards)
        .or(create_flashcard_set_rewards)
        .or(finish_quiz)
        .or(finish_flashcard_set)
        .or(current_quest)
        .or(user_quest_chain)
        .or(user_experience)
        .or(rename_content)
        .or(remove_content)
        .with(cors);

    warp::serve(server).run(bind_addr).await;

    Ok(())
}
