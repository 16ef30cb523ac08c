//! Caller-facing print sessions
//!
//! Every builder method queues one operation on the target connection and
//! returns immediately; only [`Session::write`] is awaited. Operations run in
//! the order they were issued, so a job can be built from several call sites
//! without interleaving.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thermalink_core::{FormattingState, ImageData, Instruction, RawData};
use thermalink_types::{
    Alignment, BarcodeTextPlacement, BarcodeType, ConnectionId, Font, Setting, TextEncoding,
};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::manager::Shared;
use crate::queue;
use crate::registry::ConnectionContext;

/// Ordered print-job builder for one connection
///
/// A session without an explicit connection targets the manager's default
/// connection, resolved each time an operation is issued.
///
/// # Examples
///
/// ```no_run
/// # async fn print(session: &thermalink::Session) -> thermalink::Result<()> {
/// use thermalink::{Alignment, BarcodeType};
///
/// session
///     .begin()
///     .align(Alignment::Center)
///     .bold(true)
///     .text("RECEIPT\n")
///     .bold(false)
///     .barcode(BarcodeType::Ean13, "4006381333931")
///     .feed_cut_paper(false);
///
/// session.write().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    target: Option<ConnectionId>,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>, target: Option<ConnectionId>) -> Self {
        Self { shared, target }
    }

    /// Connection this session is bound to, if any
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.target.as_ref()
    }

    // Job boundaries

    /// Start a new job: clear the buffer and reset formatting
    pub fn begin(&self) -> &Self {
        self.submit("begin", |shared, id| async move {
            with_open(&shared, &id, |context| {
                context.buffer.clear();
                context.formatting.reset();
            })
        })
    }

    /// Send the buffered job to the printer
    ///
    /// The buffer is kept, so writing again without [`Session::begin`]
    /// prints the same job again.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the link is closed or the connection was
    ///   torn down while the write was queued
    /// - [`Error::UnknownConnection`] / [`Error::AmbiguousConnection`] if no
    ///   target can be picked
    /// - [`Error::Transport`] if the transport rejects the payload
    pub async fn write(&self) -> Result<()> {
        let id = self.resolve()?;
        let shared = self.shared.clone();
        let target = id.clone();

        let handle = self.shared.queue.enqueue(&id, move || async move {
            let (link, payload) = {
                let registry = shared.registry.lock();
                let context = registry
                    .active(&target)
                    .ok_or_else(|| Error::UnknownConnection(Some(target.clone())))?;
                if !context.link.is_open() {
                    return Err(Error::NotConnected);
                }
                (context.link.clone(), context.buffer.render(shared.encoder.as_ref()))
            };

            debug!(connection_id = %target, "Writing {} bytes", payload.len());
            link.write(&payload).await?;
            Ok(())
        });

        queue::join(handle).await
    }

    // Formatting

    pub fn bold(&self, setting: impl Into<Setting>) -> &Self {
        let setting = setting.into();
        self.format("bold", move |state| state.bold = setting)
    }

    pub fn underline(&self, setting: impl Into<Setting>) -> &Self {
        let setting = setting.into();
        self.format("underline", move |state| state.underline = setting)
    }

    pub fn double_width(&self, setting: impl Into<Setting>) -> &Self {
        let setting = setting.into();
        self.format("doubleWidth", move |state| state.double_width = setting)
    }

    pub fn double_height(&self, setting: impl Into<Setting>) -> &Self {
        let setting = setting.into();
        self.format("doubleHeight", move |state| state.double_height = setting)
    }

    /// White on black printing
    pub fn inverse(&self, setting: impl Into<Setting>) -> &Self {
        let setting = setting.into();
        self.format("inverse", move |state| state.inverse = setting)
    }

    pub fn align(&self, alignment: Alignment) -> &Self {
        self.format("align", move |state| state.alignment = alignment)
    }

    /// Alignment by name (`left`, `center`, `right`)
    pub fn align_str(&self, alignment: &str) -> &Self {
        match alignment.parse() {
            Ok(alignment) => self.align(alignment),
            Err(e) => self.reject("align", e),
        }
    }

    /// Character spacing in dots, clamped to 0..=30
    pub fn char_spacing(&self, spacing: i32) -> &Self {
        self.format("charSpacing", move |state| state.set_char_spacing(spacing))
    }

    /// Line spacing in dots, clamped to 0..=255
    pub fn line_spacing(&self, spacing: i32) -> &Self {
        self.format("lineSpacing", move |state| state.set_line_spacing(spacing))
    }

    pub fn font(&self, font: Font) -> &Self {
        self.format("font", move |state| state.font = font)
    }

    /// Font by name (`A`, `B`)
    pub fn font_str(&self, font: &str) -> &Self {
        match font.parse() {
            Ok(font) => self.font(font),
            Err(e) => self.reject("font", e),
        }
    }

    /// Print head resolution used to size images; 300, anything else is 200
    pub fn dpi(&self, dpi: u16) -> &Self {
        self.format("dpi", move |state| state.set_dpi(dpi))
    }

    /// Maximum image width in millimeters
    pub fn limit_width(&self, width_mm: i32) -> &Self {
        self.format("limitWidth", move |state| state.set_image_width_mm(width_mm))
    }

    /// Barcode module width, clamped to 3..=6
    pub fn barcode_width(&self, width: i32) -> &Self {
        self.format("barcodeWidth", move |state| state.set_barcode_width(width))
    }

    /// Barcode height in dots, clamped to 1..=255
    pub fn barcode_height(&self, height: i32) -> &Self {
        self.format("barcodeHeight", move |state| state.set_barcode_height(height))
    }

    pub fn barcode_text_placement(&self, placement: BarcodeTextPlacement) -> &Self {
        self.format("barcodeTextPlacement", move |state| {
            state.barcode_text_placement = placement
        })
    }

    /// Placement by name (`none`, `above`, `below`, `both`)
    pub fn barcode_text_placement_str(&self, placement: &str) -> &Self {
        match placement.parse() {
            Ok(placement) => self.barcode_text_placement(placement),
            Err(e) => self.reject("barcodeTextPlacement", e),
        }
    }

    /// Reset formatting to defaults, keeping buffered content
    pub fn clear_formatting(&self) -> &Self {
        self.format("clearFormatting", FormattingState::reset)
    }

    /// Character set for subsequent text; kept across jobs
    pub fn set_encoding(&self, encoding: TextEncoding) -> &Self {
        self.submit("setEncoding", move |shared, id| async move {
            with_open(&shared, &id, |context| context.encoding = encoding)
        })
    }

    // Content

    /// Text; end lines with `\n`
    pub fn text(&self, text: impl Into<String>) -> &Self {
        let text = text.into();
        self.content("text", move |encoding| Instruction::Text { text, encoding })
    }

    /// Image file as bytes, Base64 or a data URL
    pub fn image(&self, image: impl Into<ImageData>) -> &Self {
        match image.into().into_bytes() {
            Ok(bytes) => self.content("image", move |_| Instruction::Image(bytes)),
            Err(e) => self.reject("image", e),
        }
    }

    pub fn qr(&self, data: impl Into<String>) -> &Self {
        let data = data.into();
        self.content("qr", move |_| Instruction::Qr(data))
    }

    /// One-dimensional barcode
    pub fn barcode(&self, kind: BarcodeType, data: impl Into<String>) -> &Self {
        let data = data.into();
        self.content("barcode", move |_| Instruction::Barcode { kind, data })
    }

    /// Barcode with the symbology given by name (`EAN13`, `CODE128`, ...)
    pub fn barcode_str(&self, kind: &str, data: impl Into<String>) -> &Self {
        if kind.eq_ignore_ascii_case("QR_CODE") || kind.eq_ignore_ascii_case("QR") {
            return self.reject("barcode", "QR codes are printed with qr()");
        }
        match kind.parse() {
            Ok(kind) => self.barcode(kind, data),
            Err(e) => self.reject("barcode", e),
        }
    }

    /// Bytes sent to the printer as is
    ///
    /// Integer values are reduced modulo 256.
    pub fn raw(&self, data: impl Into<RawData>) -> &Self {
        match data.into().into_bytes() {
            Ok(bytes) => self.submit("raw", move |shared, id| async move {
                with_open(&shared, &id, |context| context.buffer.append(bytes))
            }),
            Err(e) => self.reject("raw", e),
        }
    }

    /// Print the printer's self-test page
    pub fn self_test(&self) -> &Self {
        self.content("selfTest", |_| Instruction::SelfTest)
    }

    pub fn beep(&self) -> &Self {
        self.content("beep", |_| Instruction::Beep)
    }

    /// Open the cash drawer attached to the printer
    pub fn open_drawer(&self) -> &Self {
        self.content("openDrawer", |_| Instruction::OpenDrawer)
    }

    pub fn cut_paper(&self, half: bool) -> &Self {
        self.content("cutPaper", move |_| Instruction::Cut { half })
    }

    /// Feed to the cutter, then cut
    pub fn feed_cut_paper(&self, half: bool) -> &Self {
        self.content("feedCutPaper", move |_| Instruction::FeedCut { half })
    }

    fn resolve(&self) -> Result<ConnectionId> {
        self.shared.registry.lock().resolve(self.target.as_ref())
    }

    /// Queue an operation whose failure is logged
    fn submit<F, Fut>(&self, name: &'static str, op: F) -> &Self
    where
        F: FnOnce(Arc<Shared>, ConnectionId) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = match self.resolve() {
            Ok(id) => id,
            Err(e) => {
                warn!("{} rejected: {}", name, e);
                return self;
            }
        };

        let shared = self.shared.clone();
        let target = id.clone();
        drop(self.shared.queue.enqueue(&id, move || async move {
            let result = op(shared, target.clone()).await;
            if let Err(e) = &result {
                warn!(connection_id = %target, "{} failed: {}", name, e);
            }
            result
        }));
        self
    }

    fn format<F>(&self, name: &'static str, update: F) -> &Self
    where
        F: FnOnce(&mut FormattingState) + Send + 'static,
    {
        self.submit(name, move |shared, id| async move {
            with_open(&shared, &id, |context| update(&mut context.formatting))
        })
    }

    /// Encode an instruction with the formatting current when it runs
    fn content<F>(&self, name: &'static str, build: F) -> &Self
    where
        F: FnOnce(TextEncoding) -> Instruction + Send + 'static,
    {
        self.submit(name, move |shared, id| async move {
            let (state, encoding) = with_open(&shared, &id, |context| {
                (context.formatting.clone(), context.encoding)
            })?;

            let instruction = build(encoding);
            if instruction.may_be_unsupported() {
                trace!(connection_id = %id, "{} is ignored by printers without support", instruction);
            }
            let fragment = shared.encoder.encode(&instruction, &state).await?;

            with_open(&shared, &id, |context| context.buffer.append(fragment))
        })
    }

    fn reject(&self, name: &'static str, reason: impl fmt::Display) -> &Self {
        warn!("{} rejected: {}", name, Error::invalid(reason));
        self
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Run `f` on an active connection whose link is open
fn with_open<T>(
    shared: &Shared,
    id: &ConnectionId,
    f: impl FnOnce(&mut ConnectionContext) -> T,
) -> Result<T> {
    let mut registry = shared.registry.lock();
    let context = registry
        .active_mut(id)
        .ok_or_else(|| Error::UnknownConnection(Some(id.clone())))?;

    if !context.link.is_open() {
        return Err(Error::NotConnected);
    }
    Ok(f(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use thermalink_transport::{MemoryProvider, PrinterLink};

    use crate::PrinterManager;
    use crate::testing::{TestEncoder, settle};

    struct Fixture {
        provider: MemoryProvider,
        encoder: TestEncoder,
        manager: PrinterManager,
    }

    impl Fixture {
        async fn connected() -> Self {
            let provider = MemoryProvider::new();
            let encoder = TestEncoder::default();
            let manager = PrinterManager::new(provider.clone(), encoder.clone()).unwrap();
            manager.connect("AA:BB").await.unwrap().unwrap();
            Self { provider, encoder, manager }
        }

        fn writes(&self) -> Vec<Bytes> {
            self.provider.writes("AA:BB")
        }

        /// Formatting state the encoder saw for each text instruction
        fn text_states(&self) -> Vec<(String, FormattingState)> {
            self.encoder
                .seen()
                .into_iter()
                .filter_map(|(instruction, state)| match instruction {
                    Instruction::Text { text, .. } => Some((text, state)),
                    _ => None,
                })
                .collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_frames_job_and_keeps_buffer() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session.begin().text("A");
        session.write().await.unwrap();
        session.write().await.unwrap();

        assert_eq!(fixture.writes(), vec![Bytes::from_static(b"<A>"); 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_clears_previous_job() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session.text("old\n");
        session.write().await.unwrap();
        session.begin().text("new\n");
        session.write().await.unwrap();

        assert_eq!(
            fixture.writes(),
            vec![Bytes::from_static(b"<old\n>"), Bytes::from_static(b"<new\n>")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_encode_keeps_order() {
        let fixture = Fixture::connected().await;
        fixture.encoder.slow("first\n", Duration::from_secs(1));
        let session = fixture.manager.session();

        session.begin().text("first\n").text("second\n");
        session.write().await.unwrap();

        assert_eq!(fixture.writes(), vec![Bytes::from_static(b"<first\nsecond\n>")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interleaved_call_sites_stay_ordered() {
        let fixture = Fixture::connected().await;
        fixture.encoder.slow("1", Duration::from_millis(300));
        let a = fixture.manager.session();
        let b = a.clone();

        a.begin().text("1");
        b.text("2");
        a.text("3");
        b.write().await.unwrap();

        assert_eq!(fixture.writes(), vec![Bytes::from_static(b"<123>")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_is_clamped() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session
            .char_spacing(-5)
            .text("a")
            .char_spacing(100)
            .text("b")
            .line_spacing(-1)
            .text("c")
            .line_spacing(9000)
            .text("d");
        session.write().await.unwrap();

        let states = fixture.text_states();
        assert_eq!(states[0].1.char_spacing(), 0);
        assert_eq!(states[1].1.char_spacing(), 30);
        assert_eq!(states[2].1.line_spacing(), 0);
        assert_eq!(states[3].1.line_spacing(), 255);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_formatting_then_begin_equals_begin_twice() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session
            .bold(true)
            .align(Alignment::Right)
            .barcode_height(10)
            .clear_formatting()
            .begin()
            .text("x");
        session
            .bold(true)
            .font(Font::B)
            .begin()
            .begin()
            .text("y");
        session.write().await.unwrap();

        let states = fixture.text_states();
        assert_eq!(states[0].1, states[1].1);
        assert_eq!(states[0].1, FormattingState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_snapshots_formatting() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session
            .begin()
            .bold(true)
            .align_str("center")
            .text("a")
            .bold(Setting::Off)
            .dpi(300)
            .limit_width(50)
            .text("b");
        session.write().await.unwrap();

        let states = fixture.text_states();
        assert_eq!(states[0].1.bold, Setting::On);
        assert_eq!(states[0].1.alignment, Alignment::Center);
        assert_eq!(states[1].1.bold, Setting::Off);
        assert_eq!(states[1].1.image_width_dots(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoding_survives_begin() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session.text("gbk").set_encoding(TextEncoding::Utf8).begin().text("utf8");
        session.write().await.unwrap();

        let encodings: Vec<TextEncoding> = fixture
            .encoder
            .seen()
            .into_iter()
            .filter_map(|(instruction, _)| match instruction {
                Instruction::Text { encoding, .. } => Some(encoding),
                _ => None,
            })
            .collect();
        assert_eq!(encodings, vec![TextEncoding::Gbk, TextEncoding::Utf8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoding_chosen_at_connect() {
        let provider = MemoryProvider::new();
        let encoder = TestEncoder::default();
        let manager = PrinterManager::new(provider.clone(), encoder.clone()).unwrap();
        let utf8 = manager
            .connect_with_encoding("AA:BB", TextEncoding::Utf8)
            .await
            .unwrap()
            .unwrap();
        let gbk = manager.connect("CC:DD").await.unwrap().unwrap();

        // Reconnecting to an active printer keeps its encoding
        manager
            .connect_with_encoding("CC:DD", TextEncoding::Utf8)
            .await
            .unwrap();

        manager.use_connection(&utf8.connection_id).unwrap().text("a");
        settle().await;
        manager.use_connection(&gbk.connection_id).unwrap().text("b");
        settle().await;

        let encodings: Vec<(String, TextEncoding)> = encoder
            .seen()
            .into_iter()
            .filter_map(|(instruction, _)| match instruction {
                Instruction::Text { text, encoding } => Some((text, encoding)),
                _ => None,
            })
            .collect();
        assert_eq!(
            encodings,
            vec![
                ("a".to_string(), TextEncoding::Utf8),
                ("b".to_string(), TextEncoding::Gbk),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_raw_bypasses_encoder() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session.begin().raw(vec![256_i64, 65, -1]).raw("G0A=");
        session.write().await.unwrap();

        assert_eq!(fixture.writes(), vec![Bytes::from_static(&[b'<', 0, 65, 255, 0x1B, 0x40, b'>'])]);
        assert!(fixture.encoder.seen().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_arguments_do_not_block_job() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session
            .begin()
            .align_str("middle")
            .font_str("Z")
            .barcode_text_placement_str("sideways")
            .barcode_str("QR_CODE", "https://example.com")
            .barcode_str("EAN99", "1")
            .image("not base64!")
            .raw("%%%")
            .qr("")
            .barcode_str("EAN13", "123")
            .text("ok");
        session.write().await.unwrap();

        // The failed qr encode appended nothing
        assert_eq!(fixture.writes(), vec![Bytes::from_static(b"<[EAN13:123]ok>")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_commands() {
        let fixture = Fixture::connected().await;
        let session = fixture.manager.session();

        session
            .begin()
            .self_test()
            .beep()
            .open_drawer()
            .cut_paper(true)
            .feed_cut_paper(false)
            .image(vec![0x89, b'P', b'N', b'G']);
        session.write().await.unwrap();

        assert_eq!(
            fixture.writes(),
            vec![Bytes::from_static(
                b"<[selfTest][beep][openDrawer][cutPaper][feedCutPaper][image]>"
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_without_connection() {
        let provider = MemoryProvider::new();
        let manager = PrinterManager::new(provider, TestEncoder::default()).unwrap();

        let result = manager.session().text("x").write().await;
        assert!(matches!(result, Err(Error::UnknownConnection(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_on_closed_link() {
        let fixture = Fixture::connected().await;
        fixture.provider.link("AA:BB").unwrap().close().await;

        let result = fixture.manager.session().begin().text("x").write().await;
        assert!(matches!(result, Err(Error::NotConnected)));
        assert!(fixture.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_releases_queued_write() {
        let fixture = Fixture::connected().await;
        fixture.encoder.slow("stuck", Duration::from_secs(3600));
        let session = fixture.manager.session();

        session.begin().text("stuck");
        let write = tokio::spawn({
            let session = session.clone();
            async move { session.write().await }
        });
        settle().await;

        fixture.provider.drop_connection("AA:BB");

        assert!(matches!(write.await.unwrap(), Err(Error::NotConnected)));
        assert!(fixture.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_per_connection() {
        let fixture = Fixture::connected().await;
        let other = fixture.manager.connect("CC:DD").await.unwrap().unwrap();
        fixture.encoder.slow("slow", Duration::from_secs(10));

        let first = fixture.manager.session();
        let second = fixture.manager.use_connection(&other.connection_id).unwrap();
        assert_eq!(second.connection_id(), Some(&other.connection_id));

        first.begin().text("slow");
        second.begin().text("fast");

        // The second connection does not wait for the first one
        second.write().await.unwrap();
        assert!(fixture.writes().is_empty());
        assert_eq!(fixture.provider.writes("CC:DD"), vec![Bytes::from_static(b"<fast>")]);

        first.write().await.unwrap();
        assert_eq!(fixture.writes(), vec![Bytes::from_static(b"<slow>")]);
    }
}
