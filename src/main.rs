#[actix_web::main]
async fn main() -> std::io::Result<()> {
    lexigen_server::run().await
}
