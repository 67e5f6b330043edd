use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use zpilot::kernel::chat::{ConversationEngine, SendMessage};
use zpilot::kernel::plugins::builtin::{self, chat_bridge};
use zpilot::kernel::plugins::{PluginRegistry, PluginRuntime};
use zpilot::kernel::services::adapters::{
    ensure_conversations_dir, ensure_settings_file, load_settings, HttpAiClient,
    JsonConversationStore, MemoryEditor,
};
use zpilot::kernel::services::ports::{
    fetch_providers, ConversationStore, EditorSurface, Position, Settings,
};

mod logging;

#[derive(Parser, Debug)]
#[command(name = "zpilot")]
#[command(about = "AI completion and chat for editor buffers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the providers and models the backend offers
    Providers,
    /// Request an inline completion at a 0-based line and column
    Complete {
        file: PathBuf,
        line: u32,
        column: u32,
    },
    /// Ask a question about a file
    Chat {
        file: PathBuf,
        question: Vec<String>,
        /// Apply the first code block of the answer to the file buffer and print it
        #[arg(long)]
        apply: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logging = logging::init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(run(cli))
}

fn settings() -> Settings {
    if let Err(err) = ensure_settings_file() {
        tracing::warn!(error = %err, "cannot create settings file");
    }
    load_settings().unwrap_or_default()
}

async fn run(cli: Cli) -> Result<()> {
    let settings = settings();
    let client = Arc::new(HttpAiClient::new(&settings.ai)?);

    match cli.command {
        Command::Providers => {
            for provider in fetch_providers(client.as_ref()).await? {
                let status = if provider.available { "" } else { " (unavailable)" };
                println!("{}{status}", provider.id);
                for model in provider.models {
                    println!("  {}", model.id);
                }
            }
        }
        Command::Complete { file, line, column } => {
            let registry = PluginRegistry::global();
            builtin::register_builtins(&registry, client, settings.completion_config());
            registry.apply_overrides(&settings.plugins);
            let runtime = PluginRuntime::with_config(registry, settings.runtime_config());

            let editor = Arc::new(MemoryEditor::open(&file)?);
            runtime.mount(editor.clone());
            editor.set_cursor(Position::new(line, column));

            match editor.request_inline_completion(CancellationToken::new()).await {
                Some(text) => println!("{text}"),
                None => eprintln!("no suggestion"),
            }
            runtime.unmount();
        }
        Command::Chat {
            file,
            question,
            apply,
        } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                bail!("question must not be empty");
            }

            let store: Arc<dyn ConversationStore> =
                Arc::new(JsonConversationStore::new(ensure_conversations_dir()?));
            let engine =
                ConversationEngine::new(client.clone(), Some(store), settings.chat_config());
            engine.load_from_store()?;
            engine.create_conversation();

            let editor = Arc::new(MemoryEditor::open(&file)?);
            let filename = file.file_name().and_then(|n| n.to_str());
            let message = SendMessage::new(question)
                .with_file(&editor.language(), &editor.content(), filename)
                .with_cursor(editor.cursor());

            let turn = engine.send_message(message).await;
            let reply = engine
                .conversation(&turn.conversation_id)
                .and_then(|c| c.message(&turn.message_id).cloned())
                .context("reply message missing")?;

            if let Some(error) = reply.error.as_deref() {
                bail!("chat failed: {error}");
            }
            println!("{}", reply.content);

            if apply && !reply.code_blocks.is_empty() {
                let registry = PluginRegistry::global();
                builtin::register_builtins(&registry, client, settings.completion_config());
                registry.apply_overrides(&settings.plugins);
                let runtime = PluginRuntime::with_config(registry, settings.runtime_config());
                runtime.mount(editor.clone());

                let block =
                    engine.accept_code_block(&turn.conversation_id, &turn.message_id, 0)?;
                runtime
                    .bus()
                    .emit(chat_bridge::APPLY_CODE_EVENT, &chat_bridge::apply_code_payload(&block));
                println!("----");
                print!("{}", editor.content());
                runtime.unmount();
            }
        }
    }

    Ok(())
}
