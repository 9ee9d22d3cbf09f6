//! Retrieval of the tariff page: a saved file, or the portal's two-step form.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use std::time::Duration;
use tarifas_core::config::FetchConfig;
use tarifas_core::diagnostics::dump_best_effort;
use tarifas_core::parse::looks_like_tariff_table;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the HTML of the page holding the tariff table.
    async fn fetch(&self) -> anyhow::Result<String>;
}

pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        // saved pages are not always UTF-8
        let html = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        tracing::info!(event = "html_loaded", path = %self.path.display(), bytes = html.len());
        Ok(html)
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    form_url: Url,
    action_variants: Vec<String>,
    post_timeout: Duration,
    diagnostics_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig, diagnostics_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let form_url = Url::parse(&cfg.form_url)
            .with_context(|| format!("invalid fetch.form_url {:?}", cfg.form_url))?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            form_url,
            action_variants: cfg.action_variants.clone(),
            post_timeout: Duration::from_secs(cfg.post_timeout_seconds),
            diagnostics_dir,
        })
    }

    fn dump(&self, prefix: &str, html: &str) {
        dump_best_effort(self.diagnostics_dir.as_deref(), prefix, html);
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> anyhow::Result<String> {
        let form_page = self
            .client
            .get(self.form_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.dump("form", &form_page);

        let form = parse_query_form(&form_page)
            .ok_or_else(|| anyhow!("no query form found at {}", self.form_url))?;
        tracing::info!(
            event = "query_form_parsed",
            via_options = form.vias.len(),
            radio = ?form.radio
        );

        let base = self
            .form_url
            .join(form.action.as_deref().unwrap_or(""))
            .context("invalid form action")?;
        let targets: Vec<Url> = if self.action_variants.is_empty() {
            vec![base]
        } else {
            self.action_variants
                .iter()
                .map(|v| action_url(&base, v))
                .collect()
        };

        let body = form.post_body();
        let mut last: Option<String> = None;
        for url in targets {
            let sent = self
                .client
                .post(url.clone())
                .timeout(self.post_timeout)
                .form(&body)
                .send()
                .await;
            let html = match sent {
                Ok(resp) => {
                    let status = resp.status();
                    let html = resp.text().await?;
                    tracing::debug!(event = "form_posted", url = %url, status = status.as_u16(), bytes = html.len());
                    html
                }
                Err(e) => {
                    tracing::warn!(event = "form_post_failed", url = %url, error = %e);
                    continue;
                }
            };

            self.dump(&format!("post_{}", action_of(&url)), &html);
            if looks_like_tariff_table(&html) {
                tracing::info!(event = "tariff_page_fetched", url = %url, bytes = html.len());
                return Ok(html);
            }
            last = Some(html);
        }

        tracing::warn!(event = "tariff_table_not_recognized");
        last.ok_or_else(|| anyhow!("every form submission to {} failed", self.form_url))
    }
}

/// Fields needed to replay the portal's query form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryForm {
    pub action: Option<String>,
    /// Hidden and text inputs, in document order.
    pub fields: Vec<(String, String)>,
    /// Every `selectVia` option value.
    pub vias: Vec<String>,
    pub radio: Option<(String, String)>,
}

impl QueryForm {
    /// Urlencoded body selecting every route at once.
    pub fn post_body(&self) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = self
            .fields
            .iter()
            .filter(|(name, _)| name != "selectVia" && name != "countVias")
            .cloned()
            .collect();
        match &self.radio {
            Some(pair) => body.push(pair.clone()),
            None => body.push(("radioSel".into(), "1".into())),
        }
        for via in &self.vias {
            body.push(("selectVia".into(), via.clone()));
        }
        body.push(("countVias".into(), self.vias.len().to_string()));
        body
    }
}

fn sel(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn attr(el: &ElementRef, name: &str) -> Option<String> {
    el.value().attr(name).map(|v| v.trim().to_string())
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Picks the form holding radios and the `selectVia` list, else the first form.
pub fn parse_query_form(html: &str) -> Option<QueryForm> {
    let doc = Html::parse_document(html);
    let form_sel = sel("form")?;
    let radio_sel = sel(r#"input[type="radio"]"#)?;
    let via_sel = sel(r#"select[name="selectVia"]"#)?;
    let input_sel = sel("input")?;
    let option_sel = sel("option")?;

    let forms: Vec<ElementRef> = doc.select(&form_sel).collect();
    let form = forms
        .iter()
        .find(|f| f.select(&radio_sel).next().is_some() && f.select(&via_sel).next().is_some())
        .or_else(|| forms.first())?;

    let mut fields = Vec::new();
    for input in form.select(&input_sel) {
        let kind = attr(&input, "type")
            .unwrap_or_else(|| "text".into())
            .to_lowercase();
        let Some(name) = attr(&input, "name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if kind == "hidden" || kind == "text" {
            fields.push((name, attr(&input, "value").unwrap_or_default()));
        }
    }

    let vias = form
        .select(&via_sel)
        .flat_map(|select| select.select(&option_sel).collect::<Vec<_>>())
        .filter_map(|opt| {
            let value = attr(&opt, "value").unwrap_or_else(|| squash(&opt.text().collect::<String>()));
            (!value.is_empty()).then_some(value)
        })
        .collect();

    Some(QueryForm {
        action: attr(form, "action").filter(|a| !a.is_empty()),
        fields,
        vias,
        radio: choose_radio(&doc, form),
    })
}

fn normalize_label(text: &str) -> String {
    squash(text)
        .to_lowercase()
        .replace(['í', 'Í'], "i")
}

fn radio_label(doc: &Html, input: &ElementRef) -> String {
    if let Some(id) = input.value().id() {
        if let Some(label) = sel(&format!(r#"label[for="{}"]"#, id))
            .and_then(|s| doc.select(&s).next())
        {
            return label.text().collect();
        }
    }
    if let Some(parent) = input.parent().and_then(ElementRef::wrap) {
        if parent.value().name() == "label" {
            return parent.text().collect();
        }
    }
    input
        .next_sibling()
        .and_then(|n| n.value().as_text().map(|t| t.to_string()))
        .unwrap_or_default()
}

/// "Todas las vías" if labelled, else the second option of the first group
/// with two or more options, else the last radio.
fn choose_radio(doc: &Html, form: &ElementRef) -> Option<(String, String)> {
    let radio_sel = sel(r#"input[type="radio"]"#)?;
    let radios: Vec<(String, String, String)> = form
        .select(&radio_sel)
        .filter_map(|r| {
            let name = attr(&r, "name").filter(|n| !n.is_empty())?;
            let value = attr(&r, "value").unwrap_or_else(|| "on".into());
            Some((name, value, normalize_label(&radio_label(doc, &r))))
        })
        .collect();

    if let Some((name, value, _)) = radios.iter().find(|(_, _, l)| l.contains("todas las vias")) {
        return Some((name.clone(), value.clone()));
    }

    let mut group_order: Vec<&str> = Vec::new();
    for (name, _, _) in &radios {
        if !group_order.contains(&name.as_str()) {
            group_order.push(name);
        }
    }
    for group in group_order {
        let options: Vec<_> = radios.iter().filter(|(n, _, _)| n == group).collect();
        if options.len() >= 2 {
            return Some((options[1].0.clone(), options[1].1.clone()));
        }
    }

    radios.last().map(|(n, v, _)| (n.clone(), v.clone()))
}

/// `base` with its `action` query parameter replaced by `variant`.
pub fn action_url(base: &Url, variant: &str) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "action")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = base.clone();
    url.set_query(None);
    {
        let mut q = url.query_pairs_mut();
        for (k, v) in &kept {
            q.append_pair(k, v);
        }
        q.append_pair("action", variant);
    }
    url
}

fn action_of(url: &Url) -> String {
    url.query_pairs()
        .find(|(k, _)| k == "action")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| "form".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM_PAGE: &str = r#"<html><body>
      <form name="buscar" action="/search"><input type="text" name="q"></form>
      <form name="frmTarifas" method="post" action="ControllerUI?action=CmdSelTarifaRep1Data">
        <input type="hidden" name="tipoConsulta" value="T">
        <input type="hidden" name="countVias" value="0">
        <input type="checkbox" name="ignored" value="x">
        <input type="radio" name="radioSel" value="0" id="r0"><label for="r0">Una vía</label>
        <input type="radio" name="radioSel" value="1" id="r1"><label for="r1">Todas las Vías</label>
        <select name="selectVia" multiple>
          <option value="101">México - Cuernavaca</option>
          <option value="102">Querétaro - Irapuato</option>
          <option>Puente Tampico</option>
          <option value=""></option>
        </select>
      </form>
    </body></html>"#;

    #[test]
    fn picks_the_form_with_radios_and_route_list() {
        let form = parse_query_form(FORM_PAGE).unwrap();
        assert_eq!(
            form.action.as_deref(),
            Some("ControllerUI?action=CmdSelTarifaRep1Data")
        );
        assert_eq!(form.vias, vec!["101", "102", "Puente Tampico"]);
        assert_eq!(form.radio, Some(("radioSel".into(), "1".into())));
        assert!(form.fields.iter().all(|(n, _)| n != "ignored"));
    }

    #[test]
    fn post_body_repeats_every_route() {
        let form = parse_query_form(FORM_PAGE).unwrap();
        let body = form.post_body();
        let vias: Vec<_> = body.iter().filter(|(k, _)| k == "selectVia").collect();
        assert_eq!(vias.len(), 3);
        assert!(body.contains(&("countVias".into(), "3".into())));
        assert!(body.contains(&("tipoConsulta".into(), "T".into())));
        assert_eq!(body.iter().filter(|(k, _)| k == "countVias").count(), 1);
    }

    #[test]
    fn radio_falls_back_to_second_option_of_first_group() {
        let html = r#"<form>
            <input type="radio" name="single" value="a">
            <input type="radio" name="modo" value="x"> Una
            <input type="radio" name="modo" value="y"> Otra
        </form>"#;
        let form = parse_query_form(html).unwrap();
        assert_eq!(form.radio, Some(("modo".into(), "y".into())));
        assert!(form.vias.is_empty());
    }

    #[test]
    fn form_without_radios_defaults_radio_sel() {
        let form = parse_query_form(r#"<form><input name="a" value="1"></form>"#).unwrap();
        assert_eq!(form.radio, None);
        let body = form.post_body();
        assert_eq!(body[0], ("a".into(), "1".into()));
        assert!(body.contains(&("radioSel".into(), "1".into())));
        assert!(body.contains(&("countVias".into(), "0".into())));
    }

    #[test]
    fn no_form_is_none() {
        assert!(parse_query_form("<p>mantenimiento</p>").is_none());
    }

    #[test]
    fn action_variant_replaces_query_action() {
        let base = Url::parse("https://example.org/sibuac/ControllerUI?action=CmdSelTarifaRep1Data&x=1")
            .unwrap();
        let url = action_url(&base, "CmdTarifaRep1Data");
        assert_eq!(
            url.as_str(),
            "https://example.org/sibuac/ControllerUI?x=1&action=CmdTarifaRep1Data"
        );
        assert_eq!(action_of(&url), "CmdTarifaRep1Data");
    }

    #[tokio::test]
    async fn file_fetcher_reads_latin1_pages_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, b"<p>V\xeda</p>").unwrap();
        let html = FileFetcher::new(path).fetch().await.unwrap();
        assert!(html.starts_with("<p>V"));
        assert!(html.ends_with("a</p>"));
    }
}
