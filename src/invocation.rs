//! # Invocation Builder Module
//!
//! Costruisce le invocazioni di ffmpeg/ffprobe a partire da una `OperationRequest`.
//!
//! ## Responsabilità:
//! - Ogni argomento è un token separato: nessuna shell, nessun quoting
//! - Una richiesta produce 1-2 invocazioni (la GIF ne produce due: palette + applicazione)
//! - Le invocazioni sono immutabili una volta costruite
//!
//! ## Mappatura operazioni:
//! - `ConvertLossless`: `-map 0 -c copy` + codec sottotitoli testuale del container
//! - `ConvertLossy`: `-c:v libx264 -crf N -c:a copy`
//! - `Trim`: `-ss START -to END -c copy` (tagli allineati ai keyframe)
//! - `ExtractAudio`: `-vn -c:a CODEC`
//! - `RemoveAudio`: `-c:v copy -an`
//! - `ToGif`: `palettegen` su file temporaneo, poi `paletteuse`
//! - `Crop`: `-vf crop=w:h:x:y -c:a copy` (selezione vuota = nessuna invocazione)

use crate::engine::path_resolver::OutputPlan;
use crate::error::PegError;
use crate::operation::{BatchFormat, ContainerFormat, GifParams, OperationRequest};
use crate::timecode::TimeCode;
use crate::tool_resolver::Toolchain;
use crate::utils::path_arg;
use std::fmt;
use std::path::{Path, PathBuf};

/// One fully-formed external-tool call, not yet executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    description: String,
    tracks_progress: bool,
}

impl Invocation {
    pub fn new(program: PathBuf, args: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            program,
            args,
            description: description.into(),
            tracks_progress: false,
        }
    }

    /// Mark this invocation as one whose output drives a progress indicator.
    pub fn with_progress(mut self) -> Self {
        self.tracks_progress = true;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tracks_progress(&self) -> bool {
        self.tracks_progress
    }

    /// Argument following the first occurrence of `flag`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

/// Shell-like rendering, for logs only.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Builds invocations against a resolved toolchain
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    toolchain: Toolchain,
    overwrite: bool,
}

impl InvocationBuilder {
    pub fn new(toolchain: Toolchain, overwrite: bool) -> Self {
        Self { toolchain, overwrite }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Invocations implementing `request` on `input`, in execution order.
    ///
    /// An empty vector means there is nothing to run (degenerate crop).
    pub fn build(
        &self,
        request: &OperationRequest,
        input: &Path,
        plan: &OutputPlan,
    ) -> Result<Vec<Invocation>, PegError> {
        let invocations = match request {
            OperationRequest::InspectFile => vec![self.probe(input)],
            OperationRequest::ConvertLossless { format } => {
                vec![self.lossless(input, *format, &plan.output)]
            }
            OperationRequest::ConvertLossy { crf } => vec![self.encoder(
                format!("Encoding with CRF {}", crf.value()),
                input,
                crate::args!["-c:v", "libx264", "-crf", crf.value(), "-c:a", "copy"],
                &plan.output,
            )],
            OperationRequest::Trim { start, end } => vec![self.encoder(
                "Trimming video",
                input,
                crate::args!["-ss", start.to_arg(), "-to", end.to_arg(), "-c", "copy"],
                &plan.output,
            )],
            OperationRequest::ExtractAudio { codec } => {
                let mut args = crate::args!["-vn", "-c:a"];
                args.extend(codec.encoder_args());
                vec![self.encoder(
                    format!("Extracting audio to {}", codec.extension().to_uppercase()),
                    input,
                    args,
                    &plan.output,
                )]
            }
            OperationRequest::RemoveAudio => vec![self.encoder(
                "Removing audio track",
                input,
                crate::args!["-c:v", "copy", "-an"],
                &plan.output,
            )],
            OperationRequest::ToGif { params } => self.gif(input, *params, plan)?,
            OperationRequest::Crop { region } => {
                if region.is_degenerate() {
                    Vec::new()
                } else {
                    vec![self.encoder(
                        "Applying crop to video",
                        input,
                        crate::args!["-vf", region.filter(), "-c:a", "copy"],
                        &plan.output,
                    )]
                }
            }
            OperationRequest::BatchConvert { format, gif } => match format {
                BatchFormat::Container(container) => {
                    vec![self.lossless(input, *container, &plan.output)]
                }
                BatchFormat::Gif => self.gif(input, gif.unwrap_or_default(), plan)?,
            },
        };
        Ok(invocations)
    }

    /// ffprobe call emitting format and stream metadata as JSON.
    pub fn probe(&self, input: &Path) -> Invocation {
        Invocation::new(
            self.toolchain.ffprobe.clone(),
            crate::args![
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
                path_arg(input),
            ],
            format!("Inspecting {}", input.display()),
        )
    }

    /// Single still frame at `at`, used as a crop preview.
    pub fn preview_frame(&self, input: &Path, at: TimeCode, output: &Path) -> Invocation {
        Invocation::new(
            self.toolchain.ffmpeg.clone(),
            crate::args![
                "-ss", at.to_arg(),
                "-i", path_arg(input),
                "-vframes", "1",
                "-q:v", "2",
                "-y", path_arg(output),
            ],
            "Extracting a frame for preview",
        )
    }

    fn overwrite_flag(&self) -> &'static str {
        if self.overwrite {
            "-y"
        } else {
            "-n"
        }
    }

    /// `ffmpeg -y|-n -i INPUT <args> OUTPUT`, reporting progress.
    fn encoder(
        &self,
        description: impl Into<String>,
        input: &Path,
        args: Vec<String>,
        output: &Path,
    ) -> Invocation {
        let mut full = crate::args![self.overwrite_flag(), "-i", path_arg(input)];
        full.extend(args);
        full.push(path_arg(output));
        Invocation::new(self.toolchain.ffmpeg.clone(), full, description).with_progress()
    }

    fn lossless(&self, input: &Path, format: ContainerFormat, output: &Path) -> Invocation {
        let mut args = crate::args!["-map", "0", "-c", "copy"];
        match format.subtitle_codec() {
            Some(codec) => args.extend(crate::args!["-c:s", codec]),
            None => args.push("-sn".to_string()),
        }
        self.encoder(format!("Converting to {}", format), input, args, output)
    }

    fn gif(
        &self,
        input: &Path,
        params: GifParams,
        plan: &OutputPlan,
    ) -> Result<Vec<Invocation>, PegError> {
        let palette = plan
            .palette
            .as_deref()
            .ok_or_else(|| {
                PegError::Validation("GIF conversion needs a palette file".to_string())
            })?;
        let scale = params.scale_filter();

        let palettegen = Invocation::new(
            self.toolchain.ffmpeg.clone(),
            crate::args![
                "-i", path_arg(input),
                "-vf", format!("{},palettegen", scale),
                "-y", path_arg(palette),
            ],
            "Generating color palette",
        );

        let mut paletteuse = crate::args![
            self.overwrite_flag(),
            "-i", path_arg(input),
            "-i", path_arg(palette),
            "-filter_complex", format!("[0:v]{}[x];[x][1:v]paletteuse", scale),
        ];
        paletteuse.push(path_arg(&plan.output));

        Ok(vec![
            palettegen,
            Invocation::new(
                    self.toolchain.ffmpeg.clone(),
                paletteuse,
                format!("Converting to GIF at {}fps", params.fps),
            )
            .with_progress(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::CropRegion;
    use crate::operation::{AudioCodec, Crf};

    fn builder() -> InvocationBuilder {
        InvocationBuilder::new(
            Toolchain {
                ffmpeg: PathBuf::from("/usr/bin/ffmpeg"),
                ffprobe: PathBuf::from("/usr/bin/ffprobe"),
            },
            true,
        )
    }

    fn plan(output: &str) -> OutputPlan {
        OutputPlan { output: PathBuf::from(output), palette: None }
    }

    #[test]
    fn test_trim_uses_seek_and_cut_without_reencode() {
        let request = OperationRequest::trim(
            TimeCode::parse("00:00:05").unwrap(),
            TimeCode::parse("00:01:30").unwrap(),
        )
        .unwrap();
        let invs = builder().build(&request, Path::new("in.mp4"), &plan("in_trimmed.mp4")).unwrap();
        assert_eq!(invs.len(), 1);
        let inv = &invs[0];

        let ss = inv.args().iter().position(|a| a == "-ss").unwrap();
        let to = inv.args().iter().position(|a| a == "-to").unwrap();
        assert!(ss < to);
        assert_eq!(TimeCode::parse(inv.arg_after("-ss").unwrap()).unwrap().as_secs(), 5.0);
        assert_eq!(TimeCode::parse(inv.arg_after("-to").unwrap()).unwrap().as_secs(), 90.0);

        for flag in ["-c:v", "-c:a", "-crf", "libx264"] {
            assert!(!inv.args().iter().any(|a| a == flag), "unexpected {}", flag);
        }
        assert_eq!(inv.arg_after("-c"), Some("copy"));
        assert_eq!(inv.args().last().map(String::as_str), Some("in_trimmed.mp4"));
    }

    #[test]
    fn test_paths_stay_single_tokens() {
        let input = Path::new("/videos/my holiday; rm -rf ~.mkv");
        let request = OperationRequest::RemoveAudio;
        let inv = &builder().build(&request, input, &plan("/videos/out file.mkv")).unwrap()[0];
        assert_eq!(inv.arg_after("-i"), Some("/videos/my holiday; rm -rf ~.mkv"));
        assert_eq!(inv.args().last().map(String::as_str), Some("/videos/out file.mkv"));
        assert_eq!(
            inv.args(),
            [
                "-y",
                "-i",
                "/videos/my holiday; rm -rf ~.mkv",
                "-c:v",
                "copy",
                "-an",
                "/videos/out file.mkv"
            ]
        );
    }

    #[test]
    fn test_lossless_subtitle_mapping() {
        let b = builder();
        let request = OperationRequest::ConvertLossless { format: ContainerFormat::Mp4 };
        let mp4 = &b.build(&request, Path::new("a.mkv"), &plan("a.mp4")).unwrap()[0];
        assert_eq!(mp4.arg_after("-map"), Some("0"));
        assert_eq!(mp4.arg_after("-c"), Some("copy"));
        assert_eq!(mp4.arg_after("-c:s"), Some("mov_text"));

        let request = OperationRequest::ConvertLossless { format: ContainerFormat::Avi };
        let avi = &b.build(&request, Path::new("a.mkv"), &plan("a.avi")).unwrap()[0];
        assert!(avi.args().iter().any(|a| a == "-sn"));
        assert!(avi.arg_after("-c:s").is_none());
    }

    #[test]
    fn test_lossy_and_audio_operations() {
        let b = builder();
        let request = OperationRequest::ConvertLossy { crf: Crf::new(28).unwrap() };
        let lossy = &b.build(&request, Path::new("a.mkv"), &plan("a_crf28.mp4")).unwrap()[0];
        assert_eq!(lossy.arg_after("-c:v"), Some("libx264"));
        assert_eq!(lossy.arg_after("-crf"), Some("28"));
        assert_eq!(lossy.arg_after("-c:a"), Some("copy"));
        assert!(lossy.tracks_progress());

        let request = OperationRequest::ExtractAudio { codec: AudioCodec::Mp3 };
        let mp3 = &b.build(&request, Path::new("a.mkv"), &plan("a_audio.mp3")).unwrap()[0];
        assert!(mp3.args().iter().any(|a| a == "-vn"));
        assert_eq!(mp3.arg_after("-c:a"), Some("libmp3lame"));
        assert_eq!(mp3.arg_after("-q:a"), Some("2"));
    }

    #[test]
    fn test_gif_two_passes_share_palette() {
        let request = OperationRequest::ToGif { params: GifParams::new(12, 320).unwrap() };
        let gif_plan = OutputPlan {
            output: PathBuf::from("clip.gif"),
            palette: Some(PathBuf::from("palette_clip.png")),
        };
        let invs = builder().build(&request, Path::new("clip.mp4"), &gif_plan).unwrap();
        assert_eq!(invs.len(), 2);

        assert_eq!(invs[0].arg_after("-vf"), Some("fps=12,scale=320:-1:flags=lanczos,palettegen"));
        assert_eq!(invs[0].args().last().map(String::as_str), Some("palette_clip.png"));
        assert!(!invs[0].tracks_progress());

        assert_eq!(
            invs[1].arg_after("-filter_complex"),
            Some("[0:v]fps=12,scale=320:-1:flags=lanczos[x];[x][1:v]paletteuse")
        );
        assert_eq!(invs[1].args().iter().filter(|a| *a == "-i").count(), 2);
        assert!(invs[1].args().iter().any(|a| a == "palette_clip.png"));
        assert!(invs[1].tracks_progress());
    }

    #[test]
    fn test_gif_without_palette_is_rejected() {
        let request = OperationRequest::ToGif { params: GifParams::default() };
        let err = builder().build(&request, Path::new("clip.mp4"), &plan("clip.gif")).unwrap_err();
        assert!(matches!(err, PegError::Validation(_)));
    }

    #[test]
    fn test_crop_and_degenerate_crop() {
        let b = builder();
        let crop = OperationRequest::Crop { region: CropRegion::new(10, 20, 640, 360) };
        let inv = &b.build(&crop, Path::new("a.mp4"), &plan("a_cropped.mp4")).unwrap()[0];
        assert_eq!(inv.arg_after("-vf"), Some("crop=640:360:10:20"));
        assert_eq!(inv.arg_after("-c:a"), Some("copy"));

        let empty = OperationRequest::Crop { region: CropRegion::new(10, 20, 0, 360) };
        assert!(b.build(&empty, Path::new("a.mp4"), &plan("a_cropped.mp4")).unwrap().is_empty());
    }

    #[test]
    fn test_probe_and_no_overwrite() {
        let probe = builder().probe(Path::new("a.mp4"));
        assert_eq!(probe.program(), builder().toolchain().ffprobe.as_path());
        assert_eq!(probe.arg_after("-print_format"), Some("json"));
        assert!(probe.args().iter().any(|a| a == "-show_streams"));

        let cautious = InvocationBuilder::new(builder().toolchain().clone(), false);
        let inv = &cautious
            .build(&OperationRequest::RemoveAudio, Path::new("a.mp4"), &plan("b.mp4"))
            .unwrap()[0];
        assert_eq!(inv.args()[0], "-n");
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let inv = builder().probe(Path::new("my file.mp4"));
        assert!(inv.to_string().ends_with("-show_streams \"my file.mp4\""));
    }
}
