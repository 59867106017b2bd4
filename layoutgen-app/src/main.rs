use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use layoutgen_config::{AppConfig, ConfigError};
use layoutgen_service::GenerationService;
use layoutgen_service::errors::ServiceFailure;
use layoutgen_service::request::read_body;
use layoutgen_service::response::ServiceResponse;

/// 由 JSON 指令或布局模板生成 DXF 图纸
#[derive(Parser, Debug)]
#[command(name = "layoutgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径，缺省时按 LAYOUTGEN_CONFIG 或 ./config/default.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 根据指令文档生成 DXF
    Generate {
        /// 指令 JSON 文件
        input: PathBuf,

        /// 输出 DXF 路径
        #[arg(short, long, default_value = "layout.dxf")]
        output: PathBuf,

        /// 输出处理摘要而不是 DXF
        #[arg(long)]
        summary: bool,
    },

    /// 根据模板请求生成 DXF
    Template {
        /// 模板请求 JSON 文件
        input: PathBuf,

        /// 输出 DXF 路径，缺省为 `<模板名>.dxf`
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 输出处理摘要而不是 DXF
        #[arg(long)]
        summary: bool,
    },

    /// 列出内置模板
    Templates,
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone());
    init_logging(&config);
    info!("启动 layoutgen");

    let service = GenerationService::new(config);
    let result = run(&service, cli.command);
    service.shutdown();

    if let Err(err) = result {
        eprintln!("错误: {err:#}");
        std::process::exit(1);
    }
}

fn run(service: &GenerationService, command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            input,
            output,
            summary,
        } => {
            let body = read_body(&input).with_context(|| format!("读取 {} 失败", input.display()))?;
            let mut instructions = layoutgen_service::request::parse_instructions(&body)?;
            instructions.return_summary |= summary;
            let response = service.generate(instructions);
            emit(response, &output)
        }
        Commands::Template {
            input,
            output,
            summary,
        } => {
            let body = read_body(&input).with_context(|| format!("读取 {} 失败", input.display()))?;
            let mut request = layoutgen_service::request::parse_template_request(&body)?;
            request.return_summary |= summary;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.dxf", request.template_name)));
            let response = service.generate_from_template(request);
            emit(response, &output)
        }
        Commands::Templates => {
            let catalog = service.catalog();
            let infos = catalog
                .names()
                .iter()
                .map(|name| catalog.info(name))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&infos)
        }
    }
}

fn emit(response: Result<ServiceResponse, ServiceFailure>, output: &Path) -> Result<()> {
    match response {
        Ok(ServiceResponse::Summary(summary)) => print_json(&summary),
        Ok(ServiceResponse::Artifact(artifact)) => {
            let file = File::create(output)
                .with_context(|| format!("创建 {} 失败", output.display()))?;
            let streamed = artifact.body.is_streamed();
            let written = artifact
                .body
                .write_to(BufWriter::new(file))
                .with_context(|| format!("写入 {} 失败", output.display()))?;
            info!(
                path = %output.display(),
                bytes = written,
                streamed,
                "DXF 已写出"
            );
            println!("{} ({} bytes)", output.display(), written);
            Ok(())
        }
        Err(failure) => {
            let message = failure.to_string();
            print_json(&failure)?;
            anyhow::bail!(message)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_writer(io::stderr).with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
