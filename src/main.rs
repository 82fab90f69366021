#[actix_web::main]
async fn main() -> std::io::Result<()> {
    donation_certificate_server::run().await
}
