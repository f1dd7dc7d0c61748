pub mod error;
mod health;
mod poll;
mod statistics;
mod submit;

#[rocket::get("/")]
pub async fn index() -> &'static str {
    "This is the variant annotation cache API."
}

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        index,
        submit::submit,
        poll::poll,
        health::health,
        statistics::statistics,
    ]
}
