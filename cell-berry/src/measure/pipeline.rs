use super::config::{ChannelConfig, ConfigError, Marker, CHANNEL_COUNT};
use super::protocol::Protocol;
use super::table::{MeasurementRow, ResultsTable};
use super::Report;
use crate::consts::rgb;
use crate::distance::DistanceField;
use crate::overlay::Overlay;
use crate::region::regions;
use crate::segment::segment;
use crate::{OwnedMask, Volume};
use itertools::izip;
use log::{debug, info, warn};

/// 以标准协议测量 `volume`.
///
/// 配置错误 (例如体数据通道数不足) 在任何像素处理之前返回.
/// 信号不足, 没有候选细胞, 没有参考区域都不是错误, 只会得到空表.
pub fn run(volume: &Volume, config: &ChannelConfig) -> Result<Report, ConfigError> {
    run_with(volume, config, &Protocol::standard())
}

/// 以指定协议测量 `volume`.
pub fn run_with(
    volume: &Volume,
    config: &ChannelConfig,
    protocol: &Protocol,
) -> Result<Report, ConfigError> {
    config.check_volume(volume)?;
    let calibration = volume.calibration();
    if !calibration.is_isotropic() {
        warn!(
            "{}: 像素非方形 ({} × {}), 距离只按像素宽度换算",
            volume.name(),
            calibration.pixel_width(),
            calibration.pixel_height()
        );
    }

    let [sca1, hoechst, opn, gfp] = segment_all(volume, config, protocol);

    // 参考表型: SCA1+ GFP+.
    let mut reference = sca1.as_immut().and(&gfp.as_immut());
    reference.as_mutable().fill_holes();
    let field = DistanceField::to_foreground(&reference.as_immut());

    // 候选表型: Hoechst+ OPN+.
    let candidates = hoechst.as_immut().and(&opn.as_immut());
    let cells = regions(&candidates.as_immut());

    let mut overlay = Overlay::new(volume.slice_shape());
    overlay.push_phenotype(&sca1.as_immut(), rgb::YELLOW);
    overlay.push_phenotype(&opn.as_immut(), rgb::CYAN);
    overlay.push_phenotype(&gfp.as_immut(), rgb::BLUE);

    let mut table = ResultsTable::new();
    if !field.has_reference() {
        warn!("{}: SCA1+ GFP+ 区域为空, 距离无定义", volume.name());
    } else {
        let pixel_width = calibration.pixel_width();
        for region in cells.iter() {
            let area = region.physical_area(calibration);
            if !protocol.accepts_area(area) {
                debug!("{}: 面积 {area:.2} µm² 的候选区域被排除", volume.name());
                continue;
            }
            // 区域非空, 平均值总是存在.
            let Some(mean) = field.mean_over(region.pixels().iter().copied()) else {
                continue;
            };
            let cell = table.len();
            let (x, y) = region.centroid(calibration);
            table.push(MeasurementRow {
                image: volume.name().to_string(),
                cell,
                x,
                y,
                distance: mean * pixel_width,
            });
            overlay.push_cell(region, cell);
        }
    }
    info!(
        "{}: 候选区域 {} 个, 接受 {} 个",
        volume.name(),
        cells.len(),
        table.len()
    );

    let mut masks = Vec::with_capacity(CHANNEL_COUNT);
    for (marker, mask) in izip!(Marker::ALL, [&sca1, &hoechst, &opn, &gfp]) {
        debug!(
            "{}: {marker} 前景像素 {} 个",
            volume.name(),
            mask.as_immut().count_foreground()
        );
        masks.push((marker, mask.compress()));
    }

    Ok(Report {
        image: volume.name().to_string(),
        calibration,
        table,
        overlay,
        masks,
    })
}

/// 投影并分割一个标记所在的通道.
fn segment_marker(
    volume: &Volume,
    config: &ChannelConfig,
    protocol: &Protocol,
    marker: Marker,
) -> OwnedMask {
    let spec = config.spec(marker);
    let projection = volume.max_project(spec.channel_index());
    segment(
        &projection.as_immutable(),
        protocol.spec(marker),
        volume.calibration(),
        spec.minimum,
    )
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};

        /// 并行地分割四个通道. 各通道互不依赖, 结果与串行版本一致.
        fn segment_all(
            volume: &Volume,
            config: &ChannelConfig,
            protocol: &Protocol,
        ) -> [OwnedMask; CHANNEL_COUNT] {
            let masks: Vec<OwnedMask> = Marker::ALL
                .into_par_iter()
                .map(|m| segment_marker(volume, config, protocol, m))
                .collect();
            // 有序收集, 长度恒为 `CHANNEL_COUNT`.
            match <[OwnedMask; CHANNEL_COUNT]>::try_from(masks) {
                Ok(masks) => masks,
                Err(_) => unreachable!(),
            }
        }
    } else {
        /// 依次分割四个通道.
        fn segment_all(
            volume: &Volume,
            config: &ChannelConfig,
            protocol: &Protocol,
        ) -> [OwnedMask; CHANNEL_COUNT] {
            Marker::ALL.map(|m| segment_marker(volume, config, protocol, m))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run, run_with, segment_marker};
    use crate::measure::{ChannelConfig, Marker, Protocol};
    use crate::segment::{SegmentSpec, ThresholdMethod};
    use crate::{Calibration, Volume};
    use ndarray::{s, Array4};

    /// 无平滑, 无背景扣除, Otsu, 不填充孔洞, 不切分; 面积范围 `[1, 1000]`.
    fn plain_protocol() -> Protocol {
        let spec = SegmentSpec::new(0.0, 0.0, ThresholdMethod::Otsu, false, false).unwrap();
        Protocol::new([spec; 4], (1.0, 1000.0))
    }

    /// 64×64 单切片四通道合成图像 (通道顺序 SCA1, Hoechst, OPN, GFP).
    ///
    /// Hoechst 方块 (10..16) 与 OPN 方块 (12..18) 重叠为 4×4 区域 (12..16).
    /// SCA1 与 GFP 完全相同: 第 2, 25 列的竖线, 以及第 2, 25 行在 8..20 列的横线段.
    /// 竖线和横线段之间留有大于 2 像素的空隙, 闭运算不会形成封闭框.
    fn synthetic() -> Array4<f32> {
        let mut data = Array4::<f32>::from_elem((4, 1, 64, 64), 10.0);
        data.slice_mut(s![1, 0, 10..16, 10..16]).fill(1000.0);
        data.slice_mut(s![2, 0, 12..18, 12..18]).fill(1000.0);
        for c in [0, 3] {
            data.slice_mut(s![c, 0, .., 2]).fill(1000.0);
            data.slice_mut(s![c, 0, .., 25]).fill(1000.0);
            data.slice_mut(s![c, 0, 2, 8..20]).fill(1000.0);
            data.slice_mut(s![c, 0, 25, 8..20]).fill(1000.0);
        }
        data
    }

    fn f64_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_end_to_end_distance() {
        let v = Volume::from_array("synthetic", synthetic(), Calibration::unit()).unwrap();
        let report = run_with(&v, &ChannelConfig::default(), &plain_protocol()).unwrap();
        let rows = report.table.rows();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.image, "synthetic");
        assert_eq!(row.cell, 0);
        // 重叠区域 12..16 的质心.
        assert!(f64_eq(row.x, 14.0, 1e-9));
        assert!(f64_eq(row.y, 14.0, 1e-9));
        // 每个像素到四条线的最近距离为 10 或 11, 平均 10.25.
        assert!(f64_eq(row.distance, 10.0, 0.5), "{}", row.distance);

        assert_eq!(report.overlay.label_count(), 1);
        assert_eq!(report.masks.len(), 4);
    }

    #[test]
    fn test_distance_scales_with_pixel_size() {
        let cal = Calibration::new(0.5, 0.5).unwrap();
        let v = Volume::from_array("synthetic", synthetic(), cal).unwrap();
        let report = run_with(&v, &ChannelConfig::default(), &plain_protocol()).unwrap();
        let row = &report.table.rows()[0];
        assert!(f64_eq(row.distance, 5.0, 0.25));
        assert!(f64_eq(row.x, 7.0, 1e-9));
    }

    #[test]
    fn test_non_square_pixels() {
        // 距离只按像素宽度换算, 面积按宽 × 高换算.
        let cal = Calibration::new(0.5, 1.0).unwrap();
        let v = Volume::from_array("synthetic", synthetic(), cal).unwrap();
        let spec = SegmentSpec::new(0.0, 0.0, ThresholdMethod::Otsu, false, false).unwrap();

        let report = run_with(&v, &ChannelConfig::default(), &plain_protocol()).unwrap();
        let row = &report.table.rows()[0];
        assert!(f64_eq(row.distance, 10.25 * 0.5, 1e-9), "{}", row.distance);
        assert!(f64_eq(row.x, 7.0, 1e-9));
        assert!(f64_eq(row.y, 14.0, 1e-9));

        // 16 个像素, 每个 0.5 µm².
        let accept = Protocol::new([spec; 4], (7.5, 8.5));
        let report = run_with(&v, &ChannelConfig::default(), &accept).unwrap();
        assert_eq!(report.table.len(), 1);
        let reject = Protocol::new([spec; 4], (15.5, 16.5));
        let report = run_with(&v, &ChannelConfig::default(), &reject).unwrap();
        assert!(report.table.is_empty());
    }

    #[test]
    fn test_reference_holes_are_filled() {
        // SCA1 与 GFP 为 5..=25 的封闭方框, 候选细胞位于框内.
        // 填充后的参考区域覆盖候选细胞, 距离为 0.
        let mut data = Array4::<f32>::from_elem((4, 1, 64, 64), 10.0);
        data.slice_mut(s![1, 0, 10..16, 10..16]).fill(1000.0);
        data.slice_mut(s![2, 0, 12..18, 12..18]).fill(1000.0);
        for c in [0, 3] {
            data.slice_mut(s![c, 0, 5..=25, 5]).fill(1000.0);
            data.slice_mut(s![c, 0, 5..=25, 25]).fill(1000.0);
            data.slice_mut(s![c, 0, 5, 5..=25]).fill(1000.0);
            data.slice_mut(s![c, 0, 25, 5..=25]).fill(1000.0);
        }
        let v = Volume::from_array("ring", data, Calibration::unit()).unwrap();
        let report = run_with(&v, &ChannelConfig::default(), &plain_protocol()).unwrap();
        let rows = report.table.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].distance, 0.0);

        // 通道掩膜本身不填充孔洞.
        let sca1 = report.mask(Marker::Sca1).unwrap().decompress();
        assert_eq!(sca1.as_immut()[(14, 14)], 0);
    }

    #[test]
    fn test_channel_permutation() {
        // 把通道顺序改为 GFP, OPN, Hoechst, SCA1.
        let src = synthetic();
        let mut data = src.clone();
        for (to, from) in [(0, 3), (1, 2), (2, 1), (3, 0)] {
            data.slice_mut(s![to, .., .., ..]).assign(&src.slice(s![from, .., .., ..]));
        }
        let v = Volume::from_array("p", data, Calibration::unit()).unwrap();
        let config = ChannelConfig::from_lists([4, 3, 2, 1], [0.0; 4]).unwrap();
        let report = run_with(&v, &config, &plain_protocol()).unwrap();
        assert_eq!(report.table.len(), 1);
    }

    #[test]
    fn test_small_spot_is_excluded() {
        let mut data = synthetic();
        data.slice_mut(s![1, 0, .., ..]).fill(10.0);
        data.slice_mut(s![2, 0, .., ..]).fill(10.0);
        data[(1, 0, 40, 40)] = 1000.0;
        data[(2, 0, 40, 40)] = 1000.0;
        let v = Volume::from_array("spot", data, Calibration::unit()).unwrap();
        let protocol = {
            let spec = SegmentSpec::new(0.0, 0.0, ThresholdMethod::Otsu, false, false).unwrap();
            Protocol::new([spec; 4], (5.0, 100.0))
        };
        let report = run_with(&v, &ChannelConfig::default(), &protocol).unwrap();
        assert!(report.table.is_empty());
        assert_eq!(report.overlay.label_count(), 0);
    }

    #[test]
    fn test_weak_channel_yields_no_rows() {
        let v = Volume::from_array("weak", synthetic(), Calibration::unit()).unwrap();
        let config = ChannelConfig::from_lists([1, 2, 3, 4], [0.0, 0.0, 5000.0, 0.0]).unwrap();
        let report = run_with(&v, &config, &plain_protocol()).unwrap();
        assert!(report.table.is_empty());

        let opn = report.mask(Marker::Opn).unwrap().decompress();
        assert!(opn.as_immut().is_background());
        // 未被否决的通道不受影响.
        let hoechst = report.mask(Marker::Hoechst).unwrap().decompress();
        assert_eq!(hoechst.as_immut().count_foreground(), 36);
    }

    #[test]
    fn test_empty_reference_yields_no_rows() {
        let mut data = synthetic();
        data.slice_mut(s![3, .., .., ..]).fill(10.0);
        let v = Volume::from_array("noref", data, Calibration::unit()).unwrap();
        let report = run_with(&v, &ChannelConfig::default(), &plain_protocol()).unwrap();
        assert!(report.table.is_empty());
        // 其余表型轮廓仍然存在.
        assert!(!report.overlay.items().is_empty());
    }

    #[test]
    fn test_too_few_channels() {
        let data = Array4::<f32>::zeros((3, 1, 8, 8));
        let v = Volume::from_array("c3", data, Calibration::unit()).unwrap();
        assert!(run(&v, &ChannelConfig::default()).is_err());
    }

    #[test]
    fn test_projection_uses_brightest_slice() {
        // 第二个切片才有信号, 投影后应当与单切片结果一致.
        let single = synthetic();
        let mut stacked = Array4::<f32>::from_elem((4, 3, 64, 64), 10.0);
        stacked.slice_mut(s![.., 1..2, .., ..]).assign(&single);
        let a = Volume::from_array("a", single, Calibration::unit()).unwrap();
        let b = Volume::from_array("b", stacked, Calibration::unit()).unwrap();
        let p = plain_protocol();
        let config = ChannelConfig::default();
        for m in Marker::ALL {
            assert_eq!(
                segment_marker(&a, &config, &p, m),
                segment_marker(&b, &config, &p, m)
            );
        }
    }

    #[test]
    fn test_standard_protocol_runs() {
        let v = Volume::from_array("std", synthetic(), Calibration::unit()).unwrap();
        let report = run(&v, &ChannelConfig::default()).unwrap();
        for row in report.table.rows() {
            assert!(row.distance.is_finite() && row.distance >= 0.0);
        }
        assert_eq!(report.overlay.shape(), (64, 64));
    }
}
