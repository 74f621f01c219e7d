use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use cardmark_renderer::{DiagramRuntime, HighlightBackend, Renderer, Theme};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut input: Option<String> = None;
    let mut cloze_mode = false;
    let mut raw = false;
    let mut with_style = true;
    let mut backend = HighlightBackend::Syntect;
    let mut theme = Theme::default();
    let mut runtime_path: Option<String> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "--cloze" => cloze_mode = true,
            "--raw" => raw = true,
            "--no-style" => with_style = false,
            "--builtin-highlight" => backend = HighlightBackend::Builtin,
            "--theme" => {
                theme = match args.next().as_deref().and_then(Theme::from_name) {
                    Some(theme) => theme,
                    None => {
                        eprintln!("--theme expects: auto | light | dark");
                        print_usage();
                        process::exit(2);
                    }
                };
            }
            "--diagram-runtime" => match args.next() {
                Some(path) => runtime_path = Some(path),
                None => {
                    eprintln!("--diagram-runtime expects a path");
                    print_usage();
                    process::exit(2);
                }
            },
            _ => {
                if input.is_none() && !arg.starts_with("--") {
                    input = Some(arg);
                } else {
                    eprintln!("unexpected argument: {}", arg);
                    print_usage();
                    process::exit(2);
                }
            }
        }
    }

    let source = match input {
        Some(path) => fs::read_to_string(&path).unwrap_or_else(|err| {
            eprintln!("failed to read {}: {}", path, err);
            process::exit(1);
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .unwrap_or_else(|err| {
                    eprintln!("failed to read stdin: {}", err);
                    process::exit(1);
                });
            buffer
        }
    };

    let runtime = match runtime_path {
        Some(path) => Some(DiagramRuntime::new(path)),
        None => DiagramRuntime::from_env(),
    };
    let diagram_runtime = runtime.and_then(|runtime| {
        log::debug!("loading diagram runtime from {}", runtime.path().display());
        runtime.load()
    });
    if diagram_runtime.is_none() {
        log::debug!("no diagram runtime loaded, diagrams render as code");
    }

    let renderer = Renderer::new(theme)
        .with_highlight(backend)
        .with_diagram_runtime(diagram_runtime);

    let html = if raw {
        let renderer = if with_style {
            renderer
        } else {
            renderer.without_stylesheet()
        };
        renderer.render(&source, cloze_mode)
    } else {
        let fragment = renderer.clone().without_stylesheet().render(&source, cloze_mode);
        renderer.embed_html(&fragment, with_style)
    };

    print!("{}", html);
}

fn print_usage() {
    eprintln!(
        "Usage: cardmark-cli [--cloze] [--theme auto|light|dark] [--raw] [--no-style] [--builtin-highlight] [--diagram-runtime <path>] [input]"
    );
}
