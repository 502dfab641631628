//! User-facing texts (HTML parse mode) and inline keyboards.

use crate::adapters::telegram::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::config::toml_config::TomlConfig;
use crate::core::format::{format_count, format_duration, format_size, format_wait, sanitize_filename, truncate_chars};
use crate::domain::model::{CallbackAction, MediaKind, VideoInfo};
use crate::utils::error::BotError;
use html_escape::encode_text;
use regex::Regex;
use std::sync::OnceLock;

const CAPTION_TITLE_CHARS: usize = 45;
const ERROR_DETAIL_CHARS: usize = 120;

/// Limits quoted in the texts.
#[derive(Debug, Clone, PartialEq)]
pub struct Presets {
    pub max_downloads: usize,
    pub max_file_size: u64,
    pub video_max_height: u32,
    pub audio_bitrate_kbps: u32,
}

impl Presets {
    pub fn from_config(config: &TomlConfig) -> Self {
        Self {
            max_downloads: config.rate_limit.max_downloads,
            max_file_size: config.max_file_size_bytes(),
            video_max_height: config.media.video_max_height,
            audio_bitrate_kbps: config.media.audio_bitrate_kbps,
        }
    }

    fn size_limit(&self) -> String {
        format!("{}MB", self.max_file_size / 1024 / 1024)
    }

    fn video_label(&self) -> String {
        format!("MP4 ({}p)", self.video_max_height)
    }

    fn audio_label(&self) -> String {
        format!("MP3 ({}kbps)", self.audio_bitrate_kbps)
    }

    pub fn format_line(&self, kind: MediaKind) -> String {
        match kind {
            MediaKind::Video => format!("🎬 Formato: {}", self.video_label()),
            MediaKind::Audio => format!("🎵 Formato: {}", self.audio_label()),
        }
    }
}

impl Default for Presets {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

fn button(text: &str, action: CallbackAction) -> Option<InlineKeyboardButton> {
    action
        .as_payload()
        .map(|payload| InlineKeyboardButton::callback(text, payload))
}

fn back_to_start() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("⬅️ Volver al inicio", "start")]])
}

pub fn welcome(presets: &Presets) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "🎬 <b>YouTube Downloader Bot</b>\n\n\
         ¡Hola! 👋 Soy tu asistente para descargar contenido de YouTube de forma rápida y sencilla.\n\n\
         ✅ <b>¿Qué puedo hacer por ti?</b>\n\
         \u{20}  • Descargar videos en formato MP4 (hasta {height}p)\n\
         \u{20}  • Extraer audio en formato MP3 de alta calidad\n\
         \u{20}  • Procesar enlaces de YouTube, Shorts y enlaces cortos\n\n\
         📌 <b>Instrucciones de uso:</b>\n\
         \u{20}  1️⃣ Envía cualquier enlace de YouTube\n\
         \u{20}  2️⃣ Selecciona el formato deseado (MP4 o MP3)\n\
         \u{20}  3️⃣ ¡Recibe tu archivo en segundos!\n\n\
         ⚠️ <b>Importante:</b>\n\
         \u{20}  • Límite: {max} descargas por hora\n\
         \u{20}  • Tamaño máximo: {size}\n\
         \u{20}  • Solo para uso personal y legal\n\
         \u{20}  • Respeta los derechos de autor\n\n\
         ✨ <i>¿Listo para empezar? ¡Envía tu primer enlace!</i>",
        height = presets.video_max_height,
        max = presets.max_downloads,
        size = presets.size_limit(),
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("ℹ️ Acerca de", "about"),
            InlineKeyboardButton::callback("⚖️ Términos", "terms"),
        ],
        vec![InlineKeyboardButton::callback("✅ Empezar ahora", "help_start")],
    ]);
    (text, keyboard)
}

pub fn about(presets: &Presets) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "ℹ️ <b>Acerca de YouTube Downloader Bot</b>\n\n\
         🤖 <b>Versión:</b> {version}\n\
         ⚡ <b>Características:</b>\n\
         \u{20}  • Descarga rápida de videos y audio\n\
         \u{20}  • Límite de tamaño inteligente ({size})\n\
         \u{20}  • Sistema de rate limiting integrado\n\
         \u{20}  • Limpieza automática de archivos temporales\n\n\
         🔒 <b>Seguridad:</b>\n\
         \u{20}  • Archivos eliminados inmediatamente después de enviar\n\
         \u{20}  • Sin almacenamiento permanente de contenido\n\n\
         👨‍💻 <b>Desarrollado con:</b>\n\
         \u{20}  • Rust + Telegram Bot API\n\
         \u{20}  • yt-dlp\n\
         \u{20}  • FFmpeg (para conversión de audio)\n\n\
         💡 <i>Este bot es para uso educativo/personal.</i>",
        version = env!("CARGO_PKG_VERSION"),
        size = presets.size_limit(),
    );
    (text, back_to_start())
}

pub fn terms() -> (String, InlineKeyboardMarkup) {
    let text = "⚖️ <b>Términos de Uso</b>\n\n\
        Al utilizar este bot, aceptas los siguientes términos:\n\n\
        ✅ <b>Uso Permitido:</b>\n\
        \u{20}  • Descargar tus propios videos\n\
        \u{20}  • Contenido con licencia Creative Commons\n\
        \u{20}  • Material de dominio público\n\
        \u{20}  • Contenido con permiso explícito del creador\n\n\
        ❌ <b>Uso Prohibido:</b>\n\
        \u{20}  • Descargar contenido con copyright sin permiso\n\
        \u{20}  • Distribuir material protegido ilegalmente\n\
        \u{20}  • Usar el bot para actividades comerciales masivas\n\
        \u{20}  • Evadir sistemas de protección de derechos\n\n\
        ⚠️ <b>Responsabilidad:</b>\n\
        \u{20}  • Eres responsable legal del contenido que descargas\n\
        \u{20}  • El desarrollador no se hace responsable del mal uso\n\
        \u{20}  • YouTube y Telegram son marcas registradas\n\
        \u{20}  • Este bot no está afiliado a Google/YouTube/Telegram\n\n\
        💡 <i>Al continuar usando el bot, aceptas estos términos.</i>"
        .to_string();
    (text, back_to_start())
}

pub fn quick_guide(presets: &Presets) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "🚀 <b>Guía Rápida de Inicio</b>\n\n\
         Sigue estos 3 simples pasos:\n\n\
         ❶ <b>Envía un enlace de YouTube</b>\n\
         \u{20}  Ejemplos válidos:\n\
         \u{20}  • <code>https://youtu.be/dQw4w9WgXcQ</code>\n\
         \u{20}  • <code>https://www.youtube.com/watch?v=XUoXE3bmDJY</code>\n\
         \u{20}  • <code>https://youtube.com/shorts/abc123</code>\n\n\
         ❷ <b>Selecciona el formato</b>\n\
         \u{20}  • 🎥 <b>MP4</b> - Video con audio (hasta {height}p)\n\
         \u{20}  • 🎵 <b>MP3</b> - Solo audio ({bitrate}kbps)\n\n\
         ❸ <b>Recibe tu archivo</b>\n\
         \u{20}  • El archivo se enviará en segundos\n\
         \u{20}  • Se elimina automáticamente del servidor\n\n\
         ⚠️ <b>Límites:</b>\n\
         \u{20}  • Máximo {max} descargas por hora\n\
         \u{20}  • Tamaño máximo: {size}\n\n\
         💡 <i>¡Listo! Envía tu primer enlace para comenzar.</i>",
        height = presets.video_max_height,
        bitrate = presets.audio_bitrate_kbps,
        max = presets.max_downloads,
        size = presets.size_limit(),
    );
    (text, back_to_start())
}

pub fn help_command(presets: &Presets) -> String {
    format!(
        "🚀 <b>Guía Rápida de Inicio</b>\n\n\
         Envía un enlace de YouTube y elige MP4 o MP3.\n\n\
         ✅ Ejemplos:\n\
         • <code>https://youtu.be/VIDEO_ID</code>\n\
         • <code>https://www.youtube.com/watch?v=VIDEO_ID</code>\n\
         • <code>https://youtube.com/shorts/VIDEO_ID</code>\n\n\
         ⚠️ Límite: {max} descargas/hora | Tamaño máx: {size}\n",
        max = presets.max_downloads,
        size = presets.size_limit(),
    )
}

pub fn about_command(presets: &Presets) -> String {
    format!(
        "ℹ️ <b>Acerca de</b>\n\n\
         🤖 YouTube Downloader Bot v{version}\n\
         ✅ {video}\n\
         ✅ {audio}\n\
         🔧 Rust + yt-dlp\n",
        version = env!("CARGO_PKG_VERSION"),
        video = presets.video_label(),
        audio = presets.audio_label(),
    )
}

pub fn invalid_url() -> String {
    "❌ <b>URL no reconocida</b>\n\n\
     Por favor, envía un enlace válido de YouTube:\n\n\
     ✅ <b>Ejemplos válidos:</b>\n\
     \u{20}  • <code>https://youtu.be/VIDEO_ID</code>\n\
     \u{20}  • <code>https://www.youtube.com/watch?v=VIDEO_ID</code>\n\
     \u{20}  • <code>https://youtube.com/shorts/VIDEO_ID</code>\n"
        .to_string()
}

pub fn rate_limited(presets: &Presets, wait_seconds: u64) -> String {
    format!(
        "⏳ <b>Límite de descargas alcanzado</b>\n\n\
         Has alcanzado el máximo de {} descargas por hora.\n\n\
         ⏱ <b>Tiempo de espera:</b> {}",
        presets.max_downloads,
        format_wait(wait_seconds)
    )
}

pub fn analyzing() -> String {
    "🔍 <b>Analizando enlace...</b>\n\nExtrayendo información del video...".to_string()
}

pub fn link_too_long() -> String {
    "⚠️ <b>Enlace demasiado largo</b>\n\n\
     No puedo preparar los botones de descarga para este enlace.\n\
     💡 <i>Envía el enlace corto del video (youtu.be/...).</i>"
        .to_string()
}

/// Format picker. `None` when the link does not fit in a button payload.
pub fn format_keyboard(presets: &Presets, url: &str) -> Option<InlineKeyboardMarkup> {
    let video = button(
        &format!("🎬 Descargar {}", presets.video_label()),
        CallbackAction::Download {
            kind: MediaKind::Video,
            url: url.to_string(),
        },
    )?;
    let audio = button(
        &format!("🎵 Extraer {}", presets.audio_label()),
        CallbackAction::Download {
            kind: MediaKind::Audio,
            url: url.to_string(),
        },
    )?;
    Some(InlineKeyboardMarkup::new(vec![
        vec![video],
        vec![audio],
        vec![InlineKeyboardButton::callback("⬅️ Cancelar", "cancel")],
    ]))
}

pub fn video_card(info: &VideoInfo) -> String {
    let views = if info.views > 0 {
        format_count(info.views)
    } else {
        "N/A".to_string()
    };
    format!(
        "✅ <b>Video encontrado</b>\n\n\
         📹 <b>Título:</b> {}\n\
         👤 <b>Canal:</b> {}\n\
         ⏱ <b>Duración:</b> {}\n\
         👁 <b>Visitas:</b> {}\n\n\
         👇 <b>Selecciona el formato de descarga:</b>",
        encode_text(&sanitize_filename(&info.title)),
        encode_text(&info.uploader),
        format_duration(info.duration),
        views
    )
}

pub fn video_card_unavailable() -> String {
    "⚠️ <b>Video detectado</b>\n\n\
     No pudimos obtener información detallada, pero podemos intentar la descarga.\n\n\
     👇 <b>Selecciona el formato:</b>"
        .to_string()
}

pub fn cancelled() -> String {
    "❌ <b>Operación cancelada</b>\n\nPuedes enviar otro enlace cuando quieras.".to_string()
}

pub fn invalid_request() -> String {
    "❌ <b>Error en la solicitud</b>\n\nDatos inválidos. Envía el enlace nuevamente.".to_string()
}

pub fn download_status(presets: &Presets, kind: MediaKind) -> String {
    match kind {
        MediaKind::Video => format!(
            "⏬ <b>Descargando video...</b>\n\n🎥 Formato: {}\n⏱ Por favor espera...",
            presets.video_label()
        ),
        MediaKind::Audio => format!(
            "⏬ <b>Extrayendo audio...</b>\n\n🎵 Formato: {}\n⏱ Por favor espera...",
            presets.audio_label()
        ),
    }
}

pub fn caption(presets: &Presets, title: &str, duration: i64, size: u64, kind: MediaKind) -> String {
    format!(
        "✅ <b>{}</b>\n\n\
         ⏱ Duración: {}\n\
         📦 Tamaño: {}\n\
         {}\n\n\
         ⚠️ <i>Uso personal y legal únicamente</i>",
        encode_text(&truncate_chars(title, CAPTION_TITLE_CHARS)),
        format_duration(duration),
        format_size(size),
        presets.format_line(kind)
    )
}

pub fn completed() -> (String, InlineKeyboardMarkup) {
    let text = "🎉 <b>¡Descarga completada con éxito!</b>\n\n\
        ✅ Tu archivo ha sido enviado.\n\
        🧹 El archivo se eliminó automáticamente del servidor.\n\n\
        ¿Quieres descargar otro video?"
        .to_string();
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔄 Descargar otro", "start")],
        vec![InlineKeyboardButton::callback("ℹ️ Ayuda", "help_start")],
    ]);
    (text, keyboard)
}

/// What went wrong with a download, as far as the user is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Restricted,
    Copyright,
    Conversion,
    Timeout,
    TooLarge,
    Other(String),
}

const COPYRIGHT_MARKERS: &[&str] = &["copyright", "blocked", "unavailable"];
const CONVERSION_MARKERS: &[&str] = &["ffmpeg", "ffprobe"];
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "socket"];
const SIZE_MARKERS: &[&str] = &["file too large", "49mb", "50mb"];

// "age" only as a whole word, so "message" or "page" do not count
fn restricted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"private|sign in|\bage\b|age-restricted|confirm your age").expect("restricted regex is valid")
    })
}

impl FailureKind {
    pub fn classify(error: &BotError) -> Self {
        match error {
            BotError::FileTooLarge { .. } => return FailureKind::TooLarge,
            BotError::Timeout { .. } => return FailureKind::Timeout,
            _ => {}
        }

        let text = error.to_string().to_lowercase();
        let mentions = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

        if restricted_pattern().is_match(&text) {
            FailureKind::Restricted
        } else if mentions(COPYRIGHT_MARKERS) {
            FailureKind::Copyright
        } else if mentions(CONVERSION_MARKERS) {
            FailureKind::Conversion
        } else if mentions(TIMEOUT_MARKERS) {
            FailureKind::Timeout
        } else if mentions(SIZE_MARKERS) {
            FailureKind::TooLarge
        } else {
            FailureKind::Other(error.to_string())
        }
    }

    pub fn message(&self, presets: &Presets) -> String {
        match self {
            FailureKind::Restricted => "🔒 <b>Video privado o restringido</b>\n\n\
                YouTube no permite descargar este contenido (privado/edad/login).\n\
                💡 <i>Usa un video público sin restricciones.</i>"
                .to_string(),
            FailureKind::Copyright => "©️ <b>Restricciones de copyright</b>\n\n\
                El video tiene protección o restricción.\n\
                💡 <i>Intenta con otro video.</i>"
                .to_string(),
            FailureKind::Conversion => "🔧 <b>Error de conversión</b>\n\n\
                FFmpeg no está instalado o configurado correctamente.\n\
                💡 <i>Instala FFmpeg en el servidor/PC.</i>"
                .to_string(),
            FailureKind::Timeout => "⏱ <b>Tiempo de espera agotado</b>\n\n\
                YouTube no respondió a tiempo.\n\
                💡 <i>Intenta nuevamente en unos minutos.</i>"
                .to_string(),
            FailureKind::TooLarge => format!(
                "📦 <b>Archivo demasiado grande</b>\n\n\
                 El archivo excede el límite de {}.\n\
                 💡 <i>Usa un video más corto o descarga MP3.</i>",
                format_size(presets.max_file_size)
            ),
            FailureKind::Other(detail) => format!(
                "❌ <b>Error durante la descarga</b>\n\n\
                 Ocurrió un problema inesperado.\n\n\
                 <code>Error: {}</code>",
                encode_text(&truncate_chars(detail, ERROR_DETAIL_CHARS))
            ),
        }
    }
}

/// Retry with the same payload, or go back to the start screen.
pub fn failure_keyboard(kind: MediaKind, url: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(retry) = button(
        "🔄 Intentar nuevamente",
        CallbackAction::Download {
            kind,
            url: url.to_string(),
        },
    ) {
        rows.push(vec![retry]);
    }
    rows.push(vec![InlineKeyboardButton::callback("⬅️ Volver al inicio", "start")]);
    InlineKeyboardMarkup::new(rows)
}
