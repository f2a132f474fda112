use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use pushkind_common::domain::auth::AuthenticatedUser;

use crate::cache::InMemoryCategoryCache;
use crate::repository::DieselRepository;
use crate::routes::categories::parse_categories_query;
use crate::services::ServiceError;
use crate::services::categories::load_categories;

#[get("/v1/categories")]
/// Return the visible rows of the category tree as JSON.
///
/// Accepts the same `search`, `page`, `expanded` and `expand_all` parameters as
/// the categories page. Users without the role stored in
/// `crate::SERVICE_ACCESS_ROLE` receive a `401 Unauthorized` response.
pub async fn api_v1_categories(
    req: HttpRequest,
    user: AuthenticatedUser,
    repo: web::Data<DieselRepository>,
    cache: web::Data<InMemoryCategoryCache>,
) -> impl Responder {
    let Some(query) = parse_categories_query(&req) else {
        return HttpResponse::BadRequest().finish();
    };

    match load_categories(repo.get_ref(), cache.get_ref(), &user, query) {
        Ok(data) => HttpResponse::Ok().json(data.rows),
        Err(ServiceError::Unauthorized) => HttpResponse::Unauthorized().finish(),
        Err(err) => {
            log::error!("Failed to list categories: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
