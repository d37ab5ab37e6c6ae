#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    survey_generator::run().await
}
