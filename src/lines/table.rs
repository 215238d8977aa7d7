//! Static emission-line data.
//!
//! Energies in keV for Ka1, Ka2, Kb1, La1, Lb1, Lg1 and Ma1; `0.0` marks a
//! line that is absent or below the detectable range.

pub(crate) type ElementRow = (&'static str, u32, [f64; 7]);

#[rustfmt::skip]
pub(crate) const ELEMENTS: &[ElementRow] = &[
    //       Z     Ka1       Ka2       Kb1       La1      Lb1      Lg1      Ma1
    ("Na", 11, [1.04098,  1.04098,  1.0711,   0.0,     0.0,     0.0,     0.0]),
    ("Mg", 12, [1.25360,  1.25360,  1.3022,   0.0,     0.0,     0.0,     0.0]),
    ("Al", 13, [1.48670,  1.48627,  1.55745,  0.0,     0.0,     0.0,     0.0]),
    ("Si", 14, [1.73998,  1.73938,  1.83594,  0.0,     0.0,     0.0,     0.0]),
    ("P",  15, [2.0137,   2.0127,   2.1391,   0.0,     0.0,     0.0,     0.0]),
    ("S",  16, [2.30784,  2.30664,  2.46404,  0.0,     0.0,     0.0,     0.0]),
    ("Cl", 17, [2.62239,  2.62078,  2.8156,   0.0,     0.0,     0.0,     0.0]),
    ("Ar", 18, [2.95770,  2.95563,  3.1905,   0.0,     0.0,     0.0,     0.0]),
    ("K",  19, [3.3138,   3.3111,   3.5896,   0.0,     0.0,     0.0,     0.0]),
    ("Ca", 20, [3.69168,  3.68809,  4.0127,   0.3413,  0.3449,  0.0,     0.0]),
    ("Sc", 21, [4.0906,   4.0861,   4.4605,   0.3954,  0.3996,  0.0,     0.0]),
    ("Ti", 22, [4.51084,  4.50486,  4.93181,  0.4522,  0.4584,  0.0,     0.0]),
    ("V",  23, [4.95220,  4.94464,  5.42729,  0.5113,  0.5192,  0.0,     0.0]),
    ("Cr", 24, [5.41472,  5.40551,  5.94671,  0.5728,  0.5828,  0.0,     0.0]),
    ("Mn", 25, [5.89875,  5.88765,  6.49045,  0.6374,  0.6488,  0.0,     0.0]),
    ("Fe", 26, [6.40384,  6.39084,  7.05798,  0.7050,  0.7185,  0.0,     0.0]),
    ("Co", 27, [6.93032,  6.91530,  7.64943,  0.7762,  0.7914,  0.0,     0.0]),
    ("Ni", 28, [7.47815,  7.46089,  8.26466,  0.8515,  0.8688,  0.0,     0.0]),
    ("Cu", 29, [8.04778,  8.02783,  8.90529,  0.9297,  0.9498,  0.0,     0.0]),
    ("Zn", 30, [8.63886,  8.61578,  9.5720,   1.0117,  1.0347,  0.0,     0.0]),
    ("Ga", 31, [9.25174,  9.22482,  10.2642,  1.09792, 1.1248,  0.0,     0.0]),
    ("Ge", 32, [9.88642,  9.85532,  10.9821,  1.18800, 1.2185,  0.0,     0.0]),
    ("As", 33, [10.54372, 10.50799, 11.7262,  1.2820,  1.3170,  0.0,     0.0]),
    ("Se", 34, [11.2224,  11.1814,  12.4959,  1.37910, 1.41923, 0.0,     0.0]),
    ("Br", 35, [11.9242,  11.8776,  13.2914,  1.48043, 1.52590, 0.0,     0.0]),
    ("Kr", 36, [12.649,   12.598,   14.112,   1.5860,  1.6383,  0.0,     0.0]),
    ("Rb", 37, [13.3953,  13.3358,  14.9613,  1.69413, 1.75217, 0.0,     0.0]),
    ("Sr", 38, [14.1650,  14.0979,  15.8357,  1.80656, 1.87172, 0.0,     0.0]),
    ("Y",  39, [14.9584,  14.8829,  16.7378,  1.92256, 1.99584, 0.0,     0.0]),
    ("Zr", 40, [15.7751,  15.6909,  17.6678,  2.04236, 2.1244,  2.3027,  0.0]),
    ("Nb", 41, [16.6151,  16.5210,  18.6225,  2.16589, 2.2574,  2.4618,  0.0]),
    ("Mo", 42, [17.47934, 17.3743,  19.6083,  2.29316, 2.39481, 2.6235,  0.0]),
    ("Ru", 44, [19.2793,  19.1504,  21.6568,  2.55855, 2.68323, 2.9645,  0.0]),
    ("Rh", 45, [20.2161,  20.0737,  22.7236,  2.69674, 2.83441, 3.1438,  0.0]),
    ("Pd", 46, [21.1771,  21.0201,  23.8187,  2.83861, 2.99022, 3.3287,  0.0]),
    ("Ag", 47, [22.16292, 21.9903,  24.9424,  2.98431, 3.15094, 3.5196,  0.0]),
    ("Cd", 48, [23.1736,  22.9841,  26.0955,  3.13373, 3.31657, 3.7169,  0.0]),
    ("In", 49, [24.2097,  24.0020,  27.2759,  3.28694, 3.48721, 3.9204,  0.0]),
    ("Sn", 50, [25.2713,  25.0440,  28.4860,  3.44398, 3.66280, 4.1310,  0.0]),
    ("Sb", 51, [26.3591,  26.1108,  29.7256,  3.60472, 3.84357, 4.3474,  0.0]),
    ("Te", 52, [27.4723,  27.2017,  30.9957,  3.76933, 4.02958, 4.5709,  0.0]),
    ("I",  53, [28.6120,  28.3172,  32.2947,  3.93765, 4.22072, 4.8009,  0.0]),
    ("Cs", 55, [30.9728,  30.6251,  34.9869,  4.2865,  4.6198,  5.2804,  0.0]),
    ("Ba", 56, [32.1936,  31.8171,  36.3784,  4.46626, 4.82753, 5.5311,  0.0]),
    ("La", 57, [33.4418,  33.0341,  37.8010,  4.65097, 5.0421,  5.7885,  0.8331]),
    ("Ce", 58, [34.7197,  34.2789,  39.2573,  4.8402,  5.2622,  6.0524,  0.8830]),
    ("Pr", 59, [36.0263,  35.5502,  40.7482,  5.0337,  5.4889,  6.3221,  0.9290]),
    ("Nd", 60, [37.3610,  36.8474,  42.2713,  5.2304,  5.7216,  6.6021,  0.9780]),
    ("Sm", 62, [40.1181,  39.5224,  45.4132,  5.6361,  6.2051,  7.1803,  1.0812]),
    ("Eu", 63, [41.5422,  40.9019,  47.0379,  5.8457,  6.4564,  7.4803,  1.1309]),
    ("Gd", 64, [42.9962,  42.3089,  48.6951,  6.0572,  6.7132,  7.7858,  1.1852]),
    ("Tb", 65, [44.4816,  43.7441,  50.3828,  6.2728,  6.9780,  8.1020,  1.2400]),
    ("Dy", 66, [45.9984,  45.2079,  52.1190,  6.4952,  7.2477,  8.4188,  1.2932]),
    ("Ho", 67, [47.5467,  46.6997,  53.8765,  6.7198,  7.5253,  8.7470,  1.3477]),
    ("Er", 68, [49.1277,  48.2211,  55.6737,  6.9487,  7.8109,  9.0890,  1.4045]),
    ("Tm", 69, [50.7416,  49.7726,  57.5051,  7.1799,  8.1010,  9.4260,  1.4615]),
    ("Yb", 70, [52.3889,  51.3540,  59.3824,  7.4156,  8.4018,  9.7801,  1.5215]),
    ("Lu", 71, [54.0698,  52.9650,  61.2823,  7.6555,  8.7090,  10.1434, 1.5813]),
    ("Hf", 72, [55.7902,  54.6114,  63.2432,  7.8990,  9.0227,  10.5158, 1.6446]),
    ("Ta", 73, [57.532,   56.277,   65.2224,  8.1461,  9.3431,  10.8952, 1.7096]),
    ("W",  74, [59.31824, 57.9817,  67.2443,  8.3976,  9.67235, 11.2859, 1.7754]),
    ("Re", 75, [61.1403,  59.7179,  69.3090,  8.6524,  10.0100, 11.6854, 1.8420]),
    ("Os", 76, [63.0005,  61.4867,  71.4135,  8.9108,  10.3553, 12.0953, 1.9138]),
    ("Ir", 77, [64.8956,  63.2867,  73.5608,  9.1751,  10.7083, 12.5126, 1.9799]),
    ("Pt", 78, [66.832,   65.112,   75.748,   9.4421,  11.0707, 12.9420, 2.0505]),
    ("Au", 79, [68.8037,  66.9895,  77.984,   9.7133,  11.4423, 13.3817, 2.1229]),
    ("Hg", 80, [70.819,   68.895,   80.253,   9.9888,  11.8226, 13.8301, 2.1953]),
    ("Tl", 81, [72.8715,  70.8319,  82.576,   10.2685, 12.2133, 14.2915, 2.2708]),
    ("Pb", 82, [74.9694,  72.8042,  84.936,   10.5515, 12.6137, 14.7644, 2.3455]),
    ("Bi", 83, [77.1079,  74.8148,  87.343,   10.8388, 13.0235, 15.2477, 2.4226]),
    ("Th", 90, [93.350,   89.953,   105.609,  12.9683, 16.2024, 18.9825, 2.9968]),
    ("U",  92, [98.439,   94.665,   111.300,  13.6147, 17.2200, 20.1671, 3.1708]),
];

/// Relative intensity of a Kb1 line to Ka1, rising with atomic number.
pub(crate) fn kb1_weight(z: u32) -> f64 {
    match z {
        0..=19 => 0.10,
        20..=29 => 0.13,
        30..=39 => 0.17,
        _ => 0.20,
    }
}

pub(crate) const KA2_WEIGHT: f64 = 0.5;
pub(crate) const LB1_WEIGHT: f64 = 0.6;
pub(crate) const LG1_WEIGHT: f64 = 0.1;
