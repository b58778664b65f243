//! Episode assembly: concatenate per-line WAV clips in dialogue order.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::PodcastError;
use crate::tts::AudioClip;

/// The merged audio for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub path: PathBuf,
    /// Samples per channel.
    pub frames: u64,
    pub sample_rate: u32,
}

impl Episode {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Concatenate `clips` into `output`, strictly in the given order.
///
/// No gaps, fades or normalization are applied. Every clip must share the
/// first clip's format.
pub fn merge_clips(clips: &[AudioClip], output: &Path) -> Result<Episode, PodcastError> {
    let first = clips
        .first()
        .ok_or_else(|| PodcastError::MergeError("No clips to merge".to_string()))?;
    let spec = open_clip(first)?.spec();

    let mut writer = WavWriter::create(output, spec).map_err(|e| {
        PodcastError::MergeError(format!("Failed to create {}: {}", output.display(), e))
    })?;

    for clip in clips {
        let reader = open_clip(clip)?;
        if reader.spec() != spec {
            return Err(PodcastError::MergeError(format!(
                "Clip {} has format {:?}, expected {:?}",
                clip.path.display(),
                reader.spec(),
                spec
            )));
        }
        if reader.duration() == 0 {
            return Err(PodcastError::MergeError(format!(
                "Clip {} is empty",
                clip.path.display()
            )));
        }
        copy_samples(reader, &mut writer, clip)?;
    }

    let frames = writer.duration() as u64;
    writer
        .finalize()
        .map_err(|e| PodcastError::MergeError(format!("Failed to finalize episode: {}", e)))?;

    tracing::info!(
        clips = clips.len(),
        frames,
        path = %output.display(),
        "Merged episode"
    );

    Ok(Episode {
        path: output.to_path_buf(),
        frames,
        sample_rate: spec.sample_rate,
    })
}

/// Delete clip files once they have been merged.
pub fn remove_clips(clips: &[AudioClip]) -> Result<(), PodcastError> {
    for clip in clips {
        std::fs::remove_file(&clip.path)?;
    }
    Ok(())
}

fn open_clip(clip: &AudioClip) -> Result<WavReader<std::io::BufReader<std::fs::File>>, PodcastError> {
    WavReader::open(&clip.path).map_err(|e| {
        PodcastError::MergeError(format!("Unreadable clip {}: {}", clip.path.display(), e))
    })
}

fn copy_samples<W>(
    mut reader: WavReader<std::io::BufReader<std::fs::File>>,
    writer: &mut WavWriter<W>,
    clip: &AudioClip,
) -> Result<(), PodcastError>
where
    W: std::io::Write + std::io::Seek,
{
    let bad_clip = |e: hound::Error| {
        PodcastError::MergeError(format!("Unreadable clip {}: {}", clip.path.display(), e))
    };
    let write_failed =
        |e: hound::Error| PodcastError::MergeError(format!("Failed to write episode: {}", e));

    match reader.spec().sample_format {
        SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                writer.write_sample(sample.map_err(bad_clip)?).map_err(write_failed)?;
            }
        }
        SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                writer.write_sample(sample.map_err(bad_clip)?).map_err(write_failed)?;
            }
        }
    }
    Ok(())
}

/// Read back an existing episode and describe its format.
pub fn probe_episode(path: &Path) -> Result<(Episode, String), PodcastError> {
    let reader = WavReader::open(path).map_err(|e| {
        PodcastError::MergeError(format!("Unreadable episode {}: {}", path.display(), e))
    })?;
    let spec = reader.spec();
    let episode = Episode {
        path: path.to_path_buf(),
        frames: reader.duration() as u64,
        sample_rate: spec.sample_rate,
    };
    Ok((episode, describe_spec(&spec)))
}

/// Describe a WAV spec for display.
pub fn describe_spec(spec: &WavSpec) -> String {
    format!(
        "{} Hz, {} ch, {}-bit {}",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        match spec.sample_format {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_spec() -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write_clip(dir: &Path, index: usize, spec: WavSpec, samples: &[i16]) -> AudioClip {
        let path = dir.join(format!("line_{:03}.wav", index));
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        AudioClip { index, path }
    }

    fn read_samples(path: &Path) -> Vec<i16> {
        WavReader::open(path)
            .unwrap()
            .samples::<i16>()
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn test_merge_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![
            write_clip(dir.path(), 0, int_spec(), &[1, 1]),
            write_clip(dir.path(), 1, int_spec(), &[2, 2, 2]),
            write_clip(dir.path(), 2, int_spec(), &[3]),
        ];
        let output = dir.path().join("episode.wav");

        let episode = merge_clips(&clips, &output).unwrap();

        assert_eq!(read_samples(&output), vec![1, 1, 2, 2, 2, 3]);
        assert_eq!(episode.frames, 6);
        assert_eq!(episode.sample_rate, 8000);
    }

    #[test]
    fn test_merge_follows_slice_order_not_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), 0, int_spec(), &[10]);
        let b = write_clip(dir.path(), 1, int_spec(), &[20]);
        let output = dir.path().join("episode.wav");

        merge_clips(&[b, a], &output).unwrap();
        assert_eq!(read_samples(&output), vec![20, 10]);
    }

    #[test]
    fn test_single_clip_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let samples = [5, -5, 300, -300, 0];
        let clip = write_clip(dir.path(), 0, int_spec(), &samples);
        let output = dir.path().join("episode.wav");

        merge_clips(std::slice::from_ref(&clip), &output).unwrap();

        assert_eq!(read_samples(&output), read_samples(&clip.path));
        let merged_spec = WavReader::open(&output).unwrap().spec();
        assert_eq!(merged_spec, int_spec());
    }

    #[test]
    fn test_merge_float_clips() {
        let dir = tempfile::tempdir().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut clips = Vec::new();
        for (i, value) in [0.25f32, -0.5].iter().enumerate() {
            let path = dir.path().join(format!("f{}.wav", i));
            let mut writer = WavWriter::create(&path, spec).unwrap();
            writer.write_sample(*value).unwrap();
            writer.finalize().unwrap();
            clips.push(AudioClip { index: i, path });
        }
        let output = dir.path().join("episode.wav");

        merge_clips(&clips, &output).unwrap();

        let merged: Vec<f32> = WavReader::open(&output)
            .unwrap()
            .samples::<f32>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(merged, vec![0.25, -0.5]);
    }

    #[test]
    fn test_empty_clip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![
            write_clip(dir.path(), 0, int_spec(), &[1]),
            write_clip(dir.path(), 1, int_spec(), &[]),
        ];
        let err = merge_clips(&clips, &dir.path().join("episode.wav")).unwrap_err();
        assert!(matches!(err, PodcastError::MergeError(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_unreadable_clip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_clip(dir.path(), 0, int_spec(), &[1]);
        let bad_path = dir.path().join("line_001.wav");
        std::fs::write(&bad_path, b"definitely not riff").unwrap();
        let bad = AudioClip {
            index: 1,
            path: bad_path,
        };

        let err = merge_clips(&[good, bad], &dir.path().join("episode.wav")).unwrap_err();
        assert!(matches!(err, PodcastError::MergeError(_)));
    }

    #[test]
    fn test_mismatched_format_fails() {
        let dir = tempfile::tempdir().unwrap();
        let other = WavSpec {
            sample_rate: 16000,
            ..int_spec()
        };
        let clips = vec![
            write_clip(dir.path(), 0, int_spec(), &[1]),
            write_clip(dir.path(), 1, other, &[1]),
        ];
        assert!(merge_clips(&clips, &dir.path().join("episode.wav")).is_err());
    }

    #[test]
    fn test_no_clips_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(merge_clips(&[], &dir.path().join("episode.wav")).is_err());
    }

    #[test]
    fn test_remove_clips() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![
            write_clip(dir.path(), 0, int_spec(), &[1]),
            write_clip(dir.path(), 1, int_spec(), &[2]),
        ];
        remove_clips(&clips).unwrap();
        assert!(clips.iter().all(|c| !c.path.exists()));
    }

    #[test]
    fn test_probe_merged_episode() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![write_clip(dir.path(), 0, int_spec(), &[1; 16000])];
        let output = dir.path().join("episode.wav");
        merge_clips(&clips, &output).unwrap();

        let (episode, format) = probe_episode(&output).unwrap();
        assert_eq!(episode.frames, 16000);
        assert_eq!(episode.duration_secs(), 2.0);
        assert_eq!(format, "8000 Hz, 1 ch, 16-bit int");
    }

    #[test]
    fn test_describe_spec() {
        assert_eq!(describe_spec(&int_spec()), "8000 Hz, 1 ch, 16-bit int");
    }
}
