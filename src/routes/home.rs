use axum::response::Html;

const WELCOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Annotation Kit</title>
<style>
  main { max-width: 36rem; margin: 12vh auto; font: 16px/1.5 system-ui, sans-serif; color: #2d2a26; }
  code { background: #efe9df; padding: 0 .3em; border-radius: 3px; }
  nav a { display: inline-block; margin-right: 1rem; color: #b5542d; }
</style>
</head>
<body>
<main>
  <h1>Annotation Kit</h1>
  <p>Upload image batches to a project with <code>POST /images/upload</code>,
     review the boxes and text labels, then promote them with
     <code>POST /images/save-groundtruth</code>.</p>
  <nav>
    <a href="/swagger-ui/">API docs</a>
    <a href="/projects">Projects</a>
  </nav>
</main>
</body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Welcome page HTML", content_type = "text/html")
    ),
    tag = "General"
)]
pub async fn root() -> Html<&'static str> {
    Html(WELCOME_PAGE)
}
