use actix_web::{Responder, get};
use pushkind_common::routes::redirect;

#[get("/")]
pub async fn show_index() -> impl Responder {
    redirect("/categories")
}
