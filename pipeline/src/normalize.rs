// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! FOM/VFOM normalization.

use crate::ProcessorError;
use algorithms::normalize_auc;
use config::Normalizer;
use model::ProcessedData;
use ndarray::Array1;

fn divide(y: &Array1<f64>, denominator: Option<f64>, what: &str) -> Result<Array1<f64>, ProcessorError> {
    let Some(denominator) = denominator else {
        return Err(ProcessorError::Processing(format!(
            "{what} normalizer is not available"
        )));
    };
    if denominator == 0.0 {
        return Err(ProcessorError::Processing(format!(
            "{what} normalizer is zero"
        )));
    }
    Ok(y / denominator)
}

fn roi_denominator(processed: &ProcessedData, normalizer: Normalizer) -> Option<f64> {
    let aux = &processed.roi.aux;
    match normalizer {
        Normalizer::Roi => processed.roi.norm(),
        Normalizer::RoiSub => aux.norm3_sub_norm4,
        Normalizer::RoiAdd => aux.norm3_add_norm4,
        _ => None,
    }
}

/// Normalize one curve per the configured normalizer.
pub fn normalize_vfom(
    processed: &ProcessedData,
    y: &Array1<f64>,
    normalizer: Normalizer,
    x: &Array1<f64>,
    auc_range: (f64, f64),
) -> Result<Array1<f64>, ProcessorError> {
    match normalizer {
        Normalizer::Undefined => Ok(y.clone()),
        Normalizer::Auc => normalize_auc(&y.view(), &x.view(), auc_range.0, auc_range.1)
            .map_err(|e| ProcessorError::Processing(e.to_string())),
        Normalizer::Xgm => divide(y, processed.xgm.item.intensity, "XGM"),
        Normalizer::Roi | Normalizer::RoiSub | Normalizer::RoiAdd => {
            divide(y, roi_denominator(processed, normalizer), "ROI")
        }
    }
}

/// Normalize the pump/probe curve pair; on and off are normalized
/// independently, each with its own denominator.
pub fn normalize_vfom_pp(
    processed: &ProcessedData,
    y_on: &Array1<f64>,
    y_off: &Array1<f64>,
    normalizer: Normalizer,
    x: &Array1<f64>,
    auc_range: (f64, f64),
) -> Result<(Array1<f64>, Array1<f64>), ProcessorError> {
    match normalizer {
        Normalizer::Undefined => Ok((y_on.clone(), y_off.clone())),
        Normalizer::Auc => {
            let on = normalize_auc(&y_on.view(), &x.view(), auc_range.0, auc_range.1)
                .map_err(|e| ProcessorError::Processing(format!("on: {e}")))?;
            let off = normalize_auc(&y_off.view(), &x.view(), auc_range.0, auc_range.1)
                .map_err(|e| ProcessorError::Processing(format!("off: {e}")))?;
            Ok((on, off))
        }
        Normalizer::Xgm => Ok((
            divide(y_on, processed.xgm.on.intensity, "XGM (on)")?,
            divide(y_off, processed.xgm.off.intensity, "XGM (off)")?,
        )),
        Normalizer::Roi | Normalizer::RoiSub | Normalizer::RoiAdd => {
            let (on, off) = match normalizer {
                Normalizer::Roi => (processed.pp.roi_norm_on, processed.pp.roi_norm_off),
                Normalizer::RoiSub => (
                    processed.roi.on.norm3_sub_norm4,
                    processed.roi.off.norm3_sub_norm4,
                ),
                _ => (
                    processed.roi.on.norm3_add_norm4,
                    processed.roi.off.norm3_add_norm4,
                ),
            };
            Ok((
                divide(y_on, on, "ROI (on)")?,
                divide(y_off, off, "ROI (off)")?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn undefined_is_identity() {
        let processed = ProcessedData::new(1);
        let y = array![2.0, 4.0];
        let x = array![0.0, 1.0];
        let out = normalize_vfom(&processed, &y, Normalizer::Undefined, &x, (0.0, 1.0)).unwrap();
        assert_eq!(out, y);
    }

    #[test]
    fn xgm_divides_by_train_intensity() {
        let mut processed = ProcessedData::new(1);
        processed.xgm.item.intensity = Some(2.0);
        let y = array![2.0, 4.0];
        let x = array![0.0, 1.0];
        let out = normalize_vfom(&processed, &y, Normalizer::Xgm, &x, (0.0, 1.0)).unwrap();
        assert_eq!(out, array![1.0, 2.0]);
    }

    #[test]
    fn missing_and_zero_denominators_are_processing_errors() {
        let mut processed = ProcessedData::new(1);
        let y = array![1.0];
        let x = array![0.0];
        assert!(matches!(
            normalize_vfom(&processed, &y, Normalizer::Xgm, &x, (0.0, 1.0)),
            Err(ProcessorError::Processing(_))
        ));
        processed.xgm.item.intensity = Some(0.0);
        assert!(matches!(
            normalize_vfom(&processed, &y, Normalizer::Xgm, &x, (0.0, 1.0)),
            Err(ProcessorError::Processing(_))
        ));
    }

    #[test]
    fn pump_probe_normalizes_sides_independently() {
        let mut processed = ProcessedData::new(1);
        processed.xgm.on.intensity = Some(2.0);
        processed.xgm.off.intensity = Some(4.0);
        let y_on = array![2.0];
        let y_off = array![4.0];
        let x = array![0.0];
        let (on, off) =
            normalize_vfom_pp(&processed, &y_on, &y_off, Normalizer::Xgm, &x, (0.0, 1.0)).unwrap();
        assert_eq!(on, array![1.0]);
        assert_eq!(off, array![1.0]);
    }

    #[test]
    fn roi_normalizer_uses_the_aux_scalars() {
        let mut processed = ProcessedData::new(1);
        processed.roi.aux.norm3 = Some(4.0);
        let y = array![8.0];
        let x = array![0.0];
        let out = normalize_vfom(&processed, &y, Normalizer::Roi, &x, (0.0, 1.0)).unwrap();
        assert_eq!(out, array![2.0]);
    }
}
