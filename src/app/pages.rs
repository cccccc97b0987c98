use axum::response::Html;

const HOME: &str = include_str!("../../templates/home.html");
const DETECT: &str = include_str!("../../templates/detect.html");
const ABOUT: &str = include_str!("../../templates/about.html");

pub async fn home() -> Html<&'static str> {
    Html(HOME)
}

pub async fn detect() -> Html<&'static str> {
    Html(DETECT)
}

pub async fn about() -> Html<&'static str> {
    Html(ABOUT)
}
