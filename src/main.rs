use std::fs;
use std::io::{self, Read, Write};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use clap::Parser;

use nws_translator::env::{core::NoColor, EnvVar};
use nws_translator::parsers::html::dom::html_to_dom;
use nws_translator::parsers::html::serializer::serialize_document;
use nws_translator::translation::{
    self, AppConfig, ConfigManager, HttpModelClient, JsonFileStore, MemoryStore, PageTranslator,
    SettingsStore, StaticPageHost, TranslationError, TranslationMode, TranslationResult,
    TranslationService,
};

const DEFAULT_ENCODING: &str = "utf-8";

#[derive(Parser, Debug)]
#[command(
    name = "nws-translator",
    version,
    about = "Translate an HTML page with an LLM endpoint, bilingual or in place"
)]
struct Cli {
    /// HTML file, URL, or "-" for stdin
    #[arg(required_unless_present = "generate_config")]
    target: Option<String>,

    /// Write the translated document to this file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Target language (name or code, e.g. 中文, ja, en)
    #[arg(short, long)]
    lang: Option<String>,

    /// Translation mode: bilingual or replace
    #[arg(short, long)]
    mode: Option<String>,

    /// Chat completions endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Model name sent to the endpoint
    #[arg(long)]
    model: Option<String>,

    /// Maximum number of requests in flight
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Configuration file (TOML or JSON)
    #[arg(long)]
    config: Option<String>,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "FILE")]
    generate_config: Option<String>,

    /// Do not read or save remembered settings
    #[arg(long)]
    no_persist: bool,

    /// Only log errors
    #[arg(short, long)]
    silent: bool,
}

impl Cli {
    /// 命令行参数覆盖配置文件和环境变量中的模型设置
    fn apply_to(&self, config: &mut AppConfig) -> TranslationResult<()> {
        if let Some(endpoint) = &self.endpoint {
            config.model.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        config.validate()
    }

    /// 命令行给出的翻译设置写入设置存储，下次运行沿用
    fn apply_settings(&self, mode: Option<TranslationMode>, manager: &ConfigManager) -> TranslationResult<()> {
        if let Some(lang) = &self.lang {
            manager.set_target_language(lang)?;
        }
        if let Some(mode) = mode {
            manager.set_translation_mode(mode)?;
        }
        if let Some(limit) = self.concurrency {
            manager.set_concurrent_limit(limit)?;
        }
        Ok(())
    }

    fn settings_store(&self) -> TranslationResult<Arc<dyn SettingsStore>> {
        if self.no_persist {
            return Ok(Arc::new(MemoryStore::new()));
        }
        let store = JsonFileStore::default_location()?;
        tracing::debug!("设置目录: {}", store.dir().display());
        Ok(Arc::new(store))
    }
}

fn print_error(message: &str) {
    let no_color = NoColor::get_override().ok().flatten().unwrap_or(false);
    if !no_color && atty::is(atty::Stream::Stderr) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    } else {
        eprintln!("{}", message);
    }
}

/// 读取输入，返回 (字节, 字符集, 页面地址)
async fn read_input(target: &str) -> TranslationResult<(Vec<u8>, String, String)> {
    if target == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        return Ok((data, DEFAULT_ENCODING.to_string(), "about:blank".to_string()));
    }

    match url::Url::parse(target) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let response = reqwest::get(url.clone()).await?;
            if !response.status().is_success() {
                return Err(TranslationError::NetworkError(format!(
                    "无法获取 {}: {}",
                    url,
                    response.status()
                )));
            }

            let charset = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| {
                    value
                        .split(';')
                        .filter_map(|part| part.trim().strip_prefix("charset="))
                        .next()
                        .map(|charset| charset.trim_matches('"').to_string())
                })
                .unwrap_or_else(|| DEFAULT_ENCODING.to_string());

            let data = response.bytes().await?.to_vec();
            Ok((data, charset, url.to_string()))
        }
        _ => {
            let data = fs::read(target)?;
            let location = fs::canonicalize(target)
                .ok()
                .and_then(|path| url::Url::from_file_path(path).ok())
                .map(|url| url.to_string())
                .unwrap_or_else(|| "about:blank".to_string());
            Ok((data, DEFAULT_ENCODING.to_string(), location))
        }
    }
}

async fn run(args: Cli) -> TranslationResult<()> {
    let target = args
        .target
        .clone()
        .ok_or_else(|| TranslationError::InvalidInput("缺少输入".to_string()))?;

    let mut app_config = match &args.config {
        Some(path) => ConfigManager::load_from_file(path)?,
        None => ConfigManager::load_config()?,
    };
    app_config.apply_env_overrides()?;
    args.apply_to(&mut app_config)?;
    let mode = args.mode.as_deref().map(str::parse::<TranslationMode>).transpose()?;

    let config = Arc::new(ConfigManager::with_store(app_config, args.settings_store()?)?);
    args.apply_settings(mode, &config)?;
    // 离线处理没有滚动，全部立即翻译；不写入存储
    config.update_transient(|c| c.enable_viewport_translation = false)?;

    let client = Arc::new(HttpModelClient::new(config.model_config().clone())?);
    let service = Arc::new(TranslationService::new(client, &config));

    let (data, encoding, location) = read_input(&target).await?;
    let dom = html_to_dom(&data, &encoding)?;
    let host = Rc::new(StaticPageHost::new(&location));

    let translator = PageTranslator::new(dom.document.clone(), host, Arc::clone(&config), service);
    let report = translator.translate_page(None, None).await?;

    tracing::info!(
        "完成: 翻译 {} 个元素, 失败 {}, 跳过 {}",
        report.translated,
        report.failed,
        report.skipped
    );

    let stats = translator.service().queue_stats();
    tracing::debug!("请求峰值并发 {}, 完成 {}, 失败 {}", stats.peak_active, stats.completed, stats.failed);

    let output = serialize_document(&dom.document, &encoding)?;
    match &args.output {
        Some(path) => fs::write(path, output)?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&output)?;
            handle.flush()?;
        }
    }

    Ok(())
}

fn main() {
    let args = Cli::parse();
    translation::init_logging(if args.silent { "error" } else { "info" });

    if let Some(path) = &args.generate_config {
        match translation::generate_example_config(path) {
            Ok(()) => {
                println!("已生成示例配置文件: {}", path);
                return;
            }
            Err(e) => {
                print_error(&format!("生成配置文件失败: {}", e));
                process::exit(1);
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            print_error(&format!("创建异步运行时失败: {}", e));
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        print_error(&e.to_string());
        process::exit(1);
    }
}
