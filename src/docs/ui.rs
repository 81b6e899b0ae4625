//! Swagger UI host page, rendered from `templates/swagger-ui.html`.

use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "swagger-ui.html";
const TEMPLATE: &str = include_str!("../../templates/swagger-ui.html");

/// Render the viewer page. `cdn` is the base of a `swagger-ui-dist`
/// distribution; `spec_url` is where the browser fetches the document.
///
/// The `.html` name turns on Tera's autoescaping for every substituted value.
pub fn render_page(title: &str, cdn: &str, spec_url: &str) -> Result<String, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;

    let mut context = Context::new();
    context.insert("title", title);
    context.insert("cdn", cdn.trim_end_matches('/'));
    context.insert("spec_url", spec_url);

    tera.render(TEMPLATE_NAME, &context)
}
