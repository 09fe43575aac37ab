#[rocket::launch]
fn rocket() -> _ {
    bookkeeper::init_tracing();
    bookkeeper::web::rocket()
}
