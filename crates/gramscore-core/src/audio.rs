//! WAV loading for the audio decode pass.

use std::path::Path;

/// Read every sample frame of a WAV file as raw little-endian 16-bit PCM
/// bytes, the byte stream the decoder's audio path consumes.
pub fn read_wav_pcm(path: &Path) -> Result<Vec<u8>, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let mut pcm = Vec::with_capacity(reader.len() as usize * 2);
    match spec.sample_format {
        hound::SampleFormat::Int => {
            for sample in reader.samples::<i16>() {
                pcm.extend_from_slice(&sample?.to_le_bytes());
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                let s = (sample?.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                pcm.extend_from_slice(&s.to_le_bytes());
            }
        }
    }
    Ok(pcm)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn write_test_wav(path: &Path, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_pcm_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, &[0, 1, -1, 256]);
        let pcm = read_wav_pcm(&path).unwrap();
        assert_eq!(pcm.len(), 8);
        assert_eq!(&pcm[..2], &0i16.to_le_bytes());
        assert_eq!(&pcm[6..], &256i16.to_le_bytes());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_wav_pcm(Path::new("/nonexistent/clip.wav")).is_err());
    }
}
